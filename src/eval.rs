//! The evaluator: tests a compiled [`Expr`] against a [`Row`], producing
//! three-valued SQL logic.

use thiserror::Error;

use crate::expr::{CmpOp, Expr, TemporalField};
use crate::row::{is_case_insensitive_identifier, Row};
use crate::value::Value;

/// SQL three-valued logic result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    True,
    False,
    Null,
}

impl Tri {
    pub fn from_bool(b: bool) -> Tri {
        if b {
            Tri::True
        } else {
            Tri::False
        }
    }

    /// The top-level filter treats a `Null` result as no-match.
    pub fn is_match(self) -> bool {
        matches!(self, Tri::True)
    }

    fn not(self) -> Tri {
        match self {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Null => Tri::Null,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("cannot compare {left} and {right} with {op}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error(transparent)]
    DateTime(#[from] crate::value::DateTimeParseError),
}

/// Evaluate `expr` against `row`.
pub fn eval(expr: &Expr, row: &Row) -> Result<Tri, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(literal_truth(v)),
        Expr::Ident(name) => Ok(literal_truth(&row.get(name))),

        Expr::Not(e) => Ok(eval(e, row)?.not()),

        Expr::And(a, b) => {
            let lhs = eval(a, row)?;
            if lhs == Tri::False {
                return Ok(Tri::False);
            }
            let rhs = eval(b, row)?;
            Ok(match (lhs, rhs) {
                (_, Tri::False) => Tri::False,
                (Tri::True, Tri::True) => Tri::True,
                _ => Tri::Null,
            })
        }

        Expr::Or(a, b) => {
            let lhs = eval(a, row)?;
            if lhs == Tri::True {
                return Ok(Tri::True);
            }
            let rhs = eval(b, row)?;
            Ok(match (lhs, rhs) {
                (_, Tri::True) => Tri::True,
                (Tri::False, Tri::False) => Tri::False,
                _ => Tri::Null,
            })
        }

        Expr::Cmp(op, l, r) => {
            let lv = eval_term(l, row);
            let rv = eval_term(r, row);
            if lv.is_null() || rv.is_null() {
                return Ok(Tri::Null);
            }
            let ci = is_case_insensitive_ident(l) || is_case_insensitive_ident(r);
            compare(*op, &lv, &rv, ci).map(Tri::from_bool)
        }

        Expr::DateTimeCmp(c) => {
            c.validate()?;
            let field_value = match c.field {
                TemporalField::Date => &row.date,
                TemporalField::Time => &row.time,
            };
            let matched = match c.op {
                CmpOp::Eq => field_value.as_str() == c.literal,
                CmpOp::Ne => field_value.as_str() != c.literal,
                CmpOp::Lt => field_value.as_str() < c.literal.as_str(),
                CmpOp::Le => field_value.as_str() <= c.literal.as_str(),
                CmpOp::Gt => field_value.as_str() > c.literal.as_str(),
                CmpOp::Ge => field_value.as_str() >= c.literal.as_str(),
            };
            Ok(Tri::from_bool(matched))
        }

        Expr::Like(l, pattern) => {
            let lv = eval_term(l, row);
            match lv {
                Value::Null => Ok(Tri::Null),
                Value::Text(s) => Ok(Tri::from_bool(pattern.regex().is_match(&s))),
                other => Err(EvalError::TypeMismatch {
                    op: "LIKE",
                    left: other.type_name(),
                    right: "text",
                }),
            }
        }

        Expr::Rlike(l, pattern) => {
            let lv = eval_term(l, row);
            match lv {
                Value::Null => Ok(Tri::Null),
                Value::Text(s) => Ok(Tri::from_bool(pattern.regex().is_match(&s))),
                other => Err(EvalError::TypeMismatch {
                    op: "RLIKE",
                    left: other.type_name(),
                    right: "text",
                }),
            }
        }

        Expr::In(l, items) => {
            let lv = eval_term(l, row);
            if lv.is_null() {
                return Ok(Tri::Null);
            }
            let l_ci = is_case_insensitive_ident(l);
            for item in items {
                let iv = eval_term(item, row);
                if iv.is_null() {
                    continue;
                }
                let ci = l_ci || is_case_insensitive_ident(item);
                if compare(CmpOp::Eq, &lv, &iv, ci)? {
                    return Ok(Tri::True);
                }
            }
            Ok(Tri::False)
        }

        Expr::Between(l, lo, hi) => {
            let lv = eval_term(l, row);
            if lv.is_null() {
                return Ok(Tri::Null);
            }
            let lov = eval_term(lo, row);
            let hiv = eval_term(hi, row);
            if lov.is_null() || hiv.is_null() {
                return Ok(Tri::Null);
            }
            let ci = is_case_insensitive_ident(l)
                || is_case_insensitive_ident(lo)
                || is_case_insensitive_ident(hi);
            let ge_lo = compare(CmpOp::Ge, &lv, &lov, ci)?;
            let le_hi = compare(CmpOp::Le, &lv, &hiv, ci)?;
            Ok(Tri::from_bool(ge_lo && le_hi))
        }

        Expr::IsNull(l, negated) => {
            let lv = eval_term(l, row);
            Ok(Tri::from_bool(lv.is_null() != *negated))
        }
    }
}

fn literal_truth(v: &Value) -> Tri {
    if v.is_null() {
        Tri::Null
    } else {
        Tri::from_bool(v.is_truthy())
    }
}

fn is_case_insensitive_ident(e: &Expr) -> bool {
    matches!(e, Expr::Ident(name) if is_case_insensitive_identifier(name))
}

/// Evaluate a `term` production (identifier or literal) to a [`Value`].
/// Resolving an identifier never fails: unknown names yield `Null`.
fn eval_term(e: &Expr, row: &Row) -> Value {
    match e {
        Expr::Ident(name) => row.get(name),
        Expr::Literal(v) => v.clone(),
        // Only Ident/Literal ever appear in term position; the parser never
        // builds anything else there.
        _ => unreachable!("non-term expression in term position"),
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value, case_insensitive: bool) -> Result<bool, EvalError> {
    use Value::*;
    let result = match (l, r) {
        (Int(a), Int(b)) => cmp_ord(op, a, b),
        (Float(a), Float(b)) => cmp_ord(op, a, b),
        (Int(a), Float(b)) => cmp_ord(op, &(*a as f64), b),
        (Float(a), Int(b)) => cmp_ord(op, a, &(*b as f64)),
        (Bool(a), Bool(b)) => cmp_eq_only(op, a, b)?,
        (Text(a), Text(b)) => {
            if case_insensitive {
                cmp_ord(op, &a.to_lowercase(), &b.to_lowercase())
            } else {
                cmp_ord(op, a, b)
            }
        }
        (Null, _) | (_, Null) => unreachable!("null handled by caller"),
        (a, b) => {
            return Err(EvalError::TypeMismatch {
                op: op_name(op),
                left: a.type_name(),
                right: b.type_name(),
            })
        }
    };
    Ok(result)
}

fn cmp_ord<T: PartialOrd>(op: CmpOp, a: &T, b: &T) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn cmp_eq_only<T: PartialEq>(op: CmpOp, a: &T, b: &T) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(a == b),
        CmpOp::Ne => Ok(a != b),
        _ => Err(EvalError::TypeMismatch {
            op: op_name(op),
            left: "bool",
            right: "bool",
        }),
    }
}

fn op_name(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "=",
        CmpOp::Ne => "<>",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{EntryKind, TemporalContext};

    fn row(ctx: &TemporalContext, name: &str, size: i64) -> Row<'_> {
        Row::new(
            name.to_string(),
            format!("/tmp/{name}"),
            size,
            chrono::Local::now(),
            EntryKind::File,
            String::new(),
            String::new(),
            ctx,
        )
    }

    #[test]
    fn three_valued_and_or() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "a.txt", 10);

        // x absent OR TRUE -> match
        let e = Expr::Or(
            Box::new(Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Ident("nope".into())),
                Box::new(Expr::Literal(Value::Int(1))),
            )),
            Box::new(Expr::Literal(Value::Bool(true))),
        );
        assert_eq!(eval(&e, &r).unwrap(), Tri::True);

        // x absent AND TRUE -> no match
        let e = Expr::And(
            Box::new(Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Ident("nope".into())),
                Box::new(Expr::Literal(Value::Int(1))),
            )),
            Box::new(Expr::Literal(Value::Bool(true))),
        );
        assert_eq!(eval(&e, &r).unwrap(), Tri::Null);
        assert!(!eval(&e, &r).unwrap().is_match());
    }

    #[test]
    fn de_morgan_holds_for_non_null_rows() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "a.txt", 10);

        let a = || Expr::Literal(Value::Bool(true));
        let b = || Expr::Literal(Value::Bool(false));

        let lhs = Expr::not(Expr::and(a(), b()));
        let rhs = Expr::or(Expr::not(a()), Expr::not(b()));
        assert_eq!(eval(&lhs, &r).unwrap(), eval(&rhs, &r).unwrap());
    }

    #[test]
    fn between_is_inclusive_and_false_when_inverted() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "a.txt", 500);

        let e = Expr::Between(
            Box::new(Expr::Ident("size".into())),
            Box::new(Expr::Literal(Value::Int(0))),
            Box::new(Expr::Literal(Value::Int(1000))),
        );
        assert_eq!(eval(&e, &r).unwrap(), Tri::True);

        let inverted = Expr::Between(
            Box::new(Expr::Ident("size".into())),
            Box::new(Expr::Literal(Value::Int(1000))),
            Box::new(Expr::Literal(Value::Int(0))),
        );
        assert_eq!(eval(&inverted, &r).unwrap(), Tri::False);
    }

    #[test]
    fn is_null_never_yields_null() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "a.txt", 10);
        let e = Expr::IsNull(Box::new(Expr::Ident("missing".into())), false);
        assert_eq!(eval(&e, &r).unwrap(), Tri::True);
        let e = Expr::IsNull(Box::new(Expr::Ident("missing".into())), true);
        assert_eq!(eval(&e, &r).unwrap(), Tri::False);
    }

    #[test]
    fn in_is_case_insensitive_when_an_item_is_a_case_insensitive_ident() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "a.JPG", 10);

        // Left side is a plain literal (not case-insensitive on its own);
        // the `ext` item on the right is, so the whole comparison folds.
        let e = Expr::In(
            Box::new(Expr::Literal(Value::Text("jpg".into()))),
            vec![Expr::Ident("ext".into())],
        );
        assert_eq!(eval(&e, &r).unwrap(), Tri::True);
    }

    #[test]
    fn between_is_case_insensitive_when_bound_is_a_case_insensitive_ident() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "m.txt", 10);

        // `size` isn't case-insensitive, but the `name` bound is, so the
        // whole BETWEEN folds case for the comparison.
        let e = Expr::Between(
            Box::new(Expr::Literal(Value::Text("M.TXT".into()))),
            Box::new(Expr::Literal(Value::Text("a".into()))),
            Box::new(Expr::Ident("name".into())),
        );
        assert_eq!(eval(&e, &r).unwrap(), Tri::True);
    }

    #[test]
    fn eval_error_stops_the_walk_regardless_of_policy() {
        let ctx = TemporalContext::default();
        let r = row(&ctx, "a.txt", 10);
        let e = Expr::Cmp(
            CmpOp::Gt,
            Box::new(Expr::Ident("size".into())),
            Box::new(Expr::Literal(Value::Text("big".into()))),
        );
        assert!(eval(&e, &r).is_err());
    }
}
