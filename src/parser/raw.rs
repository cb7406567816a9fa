//! Turns query text into a [`RawExpr`] tree, following the grammar's own
//! precedence structure (or_expr/and_expr/not_expr) rather than a separate
//! Pratt parser, since the grammar already encodes AND/OR/NOT precedence.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{Loc, RawCmpOp, RawExpr, RawPredicate, RawTerm};
use super::error::ParseError;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct GrammarParser;

/// Parse `input` into a [`RawExpr`], reporting syntax errors with a span
/// into `input`.
pub fn parse(input: &str) -> Result<RawExpr, ParseError> {
    let mut pairs = GrammarParser::parse(Rule::program, input)
        .map_err(|e| ParseError::from_pest(e, input))?;
    let program = pairs.next().expect("program rule always produces a pair");
    let expr_pair = program
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .expect("program always contains exactly one expr");
    build_expr(expr_pair)
}

fn build_expr(pair: Pair<Rule>) -> Result<RawExpr, ParseError> {
    let or_pair = pair
        .into_inner()
        .next()
        .expect("expr always wraps an or_expr");
    build_or(or_pair)
}

fn build_or(pair: Pair<Rule>) -> Result<RawExpr, ParseError> {
    let mut inner = pair.into_inner();
    let mut node = build_and(inner.next().expect("or_expr always has an and_expr"))?;
    while inner.next().is_some() {
        let rhs_pair = inner.next().expect("or_kw is always followed by and_expr");
        let rhs = build_and(rhs_pair)?;
        node = RawExpr::Or(Box::new(node), Box::new(rhs));
    }
    Ok(node)
}

fn build_and(pair: Pair<Rule>) -> Result<RawExpr, ParseError> {
    let mut inner = pair.into_inner();
    let mut node = build_not(inner.next().expect("and_expr always has a not_expr"))?;
    while inner.next().is_some() {
        let rhs_pair = inner
            .next()
            .expect("and_kw is always followed by not_expr");
        let rhs = build_not(rhs_pair)?;
        node = RawExpr::And(Box::new(node), Box::new(rhs));
    }
    Ok(node)
}

fn build_not(pair: Pair<Rule>) -> Result<RawExpr, ParseError> {
    let mut inner = pair.into_inner();
    let first = inner.next().expect("not_expr always has at least one child");
    match first.as_rule() {
        Rule::not_kw => {
            let rest = inner.next().expect("not_kw is always followed by not_expr");
            Ok(RawExpr::Not(Box::new(build_not(rest)?)))
        }
        Rule::expr => build_expr(first),
        Rule::predicate => build_predicate(first),
        other => unreachable!("unexpected rule under not_expr: {other:?}"),
    }
}

fn build_predicate(pair: Pair<Rule>) -> Result<RawExpr, ParseError> {
    let loc = Loc::from_span(pair.as_span());
    let alt = pair
        .into_inner()
        .next()
        .expect("predicate always wraps exactly one alternative");
    let kind = match alt.as_rule() {
        Rule::cmp_pred => build_cmp(alt)?,
        Rule::like_pred => build_like(alt, false),
        Rule::ilike_pred => build_like(alt, true),
        Rule::rlike_pred => build_rlike(alt),
        Rule::in_pred => build_in(alt),
        Rule::between_pred => build_between(alt),
        Rule::is_null_pred => build_is_null(alt),
        Rule::truthy_pred => build_truthy(alt),
        other => unreachable!("unexpected predicate alternative: {other:?}"),
    };
    Ok(RawExpr::Predicate(kind, loc))
}

fn build_cmp(pair: Pair<Rule>) -> Result<RawPredicate, ParseError> {
    let mut inner = pair.into_inner();
    let left = build_term(inner.next().unwrap());
    let op_pair = inner.next().unwrap();
    let op = match op_pair.as_str() {
        "=" => RawCmpOp::Eq,
        "!=" | "<>" => RawCmpOp::Ne,
        "<" => RawCmpOp::Lt,
        "<=" => RawCmpOp::Le,
        ">" => RawCmpOp::Gt,
        ">=" => RawCmpOp::Ge,
        other => unreachable!("unexpected comparison operator: {other}"),
    };
    let right = build_term(inner.next().unwrap());
    Ok(RawPredicate::Cmp { op, left, right })
}

fn build_like(pair: Pair<Rule>, case_insensitive: bool) -> RawPredicate {
    let mut inner = pair.into_inner();
    let left = build_term(inner.next().unwrap());
    let _kw = inner.next().unwrap();
    let pattern = build_term(inner.next().unwrap());
    RawPredicate::Like {
        left,
        pattern,
        case_insensitive,
    }
}

fn build_rlike(pair: Pair<Rule>) -> RawPredicate {
    let mut inner = pair.into_inner();
    let left = build_term(inner.next().unwrap());
    let _kw = inner.next().unwrap();
    let pattern = build_term(inner.next().unwrap());
    RawPredicate::Rlike { left, pattern }
}

fn build_in(pair: Pair<Rule>) -> RawPredicate {
    let mut inner = pair.into_inner().peekable();
    let left = build_term(inner.next().unwrap());
    let negated = matches!(inner.peek().map(|p| p.as_rule()), Some(Rule::not_kw));
    if negated {
        inner.next();
    }
    let _in_kw = inner.next().unwrap();
    let items = inner.map(build_term).collect();
    RawPredicate::In {
        left,
        items,
        negated,
    }
}

fn build_between(pair: Pair<Rule>) -> RawPredicate {
    let mut inner = pair.into_inner().peekable();
    let left = build_term(inner.next().unwrap());
    let negated = matches!(inner.peek().map(|p| p.as_rule()), Some(Rule::not_kw));
    if negated {
        inner.next();
    }
    let _between_kw = inner.next().unwrap();
    let lo = build_term(inner.next().unwrap());
    let _and_kw = inner.next().unwrap();
    let hi = build_term(inner.next().unwrap());
    RawPredicate::Between {
        left,
        lo,
        hi,
        negated,
    }
}

fn build_is_null(pair: Pair<Rule>) -> RawPredicate {
    let mut inner = pair.into_inner().peekable();
    let left = build_term(inner.next().unwrap());
    let _is_kw = inner.next().unwrap();
    let negated = matches!(inner.peek().map(|p| p.as_rule()), Some(Rule::not_kw));
    if negated {
        inner.next();
    }
    let _null_kw = inner.next().unwrap();
    RawPredicate::IsNull { left, negated }
}

fn build_truthy(pair: Pair<Rule>) -> RawPredicate {
    let mut inner = pair.into_inner();
    let term = build_term(inner.next().unwrap());
    RawPredicate::Truthy { term }
}

fn build_term(pair: Pair<Rule>) -> RawTerm {
    let loc = Loc::from_span(pair.as_span());
    let inner = pair
        .into_inner()
        .next()
        .expect("term always wraps exactly one literal or identifier");
    let text = inner.as_str();
    match inner.as_rule() {
        Rule::size_number => RawTerm::SizeNumber(text.to_string(), loc),
        Rule::number => RawTerm::Number(text.to_string(), loc),
        Rule::string => RawTerm::String(unescape_string(text), loc),
        Rule::boolean => RawTerm::Bool(text.eq_ignore_ascii_case("true"), loc),
        Rule::identifier => RawTerm::Ident(text.to_string(), loc),
        other => unreachable!("unexpected term child: {other:?}"),
    }
}

/// Strip the surrounding quotes from a matched `string` token and resolve
/// backslash escapes.
fn unescape_string(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let expr = parse("size > 100").unwrap();
        assert!(matches!(
            expr,
            RawExpr::Predicate(RawPredicate::Cmp { .. }, _)
        ));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // a OR b AND c should parse as a OR (b AND c)
        let expr = parse("size > 1 or size > 2 and size > 3").unwrap();
        match expr {
            RawExpr::Or(_, rhs) => assert!(matches!(*rhs, RawExpr::And(_, _))),
            other => panic!("expected Or at top level, got {other:?}"),
        }
    }

    #[test]
    fn not_is_recursive() {
        let expr = parse("not not size > 1").unwrap();
        assert!(matches!(expr, RawExpr::Not(_)));
    }

    #[test]
    fn parens_group() {
        let expr = parse("(size > 1 or size > 2) and size > 3").unwrap();
        assert!(matches!(expr, RawExpr::And(_, _)));
    }

    #[test]
    fn in_list_with_not() {
        let expr = parse("ext not in ('gz', 'zip')").unwrap();
        match expr {
            RawExpr::Predicate(RawPredicate::In { items, negated, .. }, _) => {
                assert!(negated);
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected In predicate, got {other:?}"),
        }
    }

    #[test]
    fn between_with_not() {
        let expr = parse("size not between 1 and 100").unwrap();
        assert!(matches!(
            expr,
            RawExpr::Predicate(RawPredicate::Between { negated: true, .. }, _)
        ));
    }

    #[test]
    fn is_not_null() {
        let expr = parse("archive is not null").unwrap();
        assert!(matches!(
            expr,
            RawExpr::Predicate(RawPredicate::IsNull { negated: true, .. }, _)
        ));
    }

    #[test]
    fn string_escapes_are_resolved() {
        let expr = parse(r#"name = "a\"b""#).unwrap();
        match expr {
            RawExpr::Predicate(RawPredicate::Cmp { right, .. }, _) => match right {
                RawTerm::String(s, _) => assert_eq!(s, "a\"b"),
                other => panic!("expected string term, got {other:?}"),
            },
            other => panic!("expected Cmp predicate, got {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("size >>").is_err());
    }
}
