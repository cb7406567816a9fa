//! The typed expression tree.
//!
//! Kept as a plain boxed recursive enum rather than a `recursion`-crate-based
//! fold — see DESIGN.md for why the heavier recursion-scheme machinery was
//! dropped.

use std::fmt;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

impl CmpOp {
    /// Flip an operator's direction, used when the typechecker normalizes
    /// `literal OP ident` into `ident OP' literal`.
    pub fn flipped(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }
}

/// Which closed-schema temporal field a [`DateTimeCmp`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalField {
    Date,
    Time,
}

/// A comparison between the `date`/`time` identifier and a literal, with the
/// literal's partial-date/time parse validated once and cached on first use.
#[derive(Debug)]
pub struct DateTimeCmp {
    pub field: TemporalField,
    pub op: CmpOp,
    pub literal: String,
    validated: OnceLock<Result<(), crate::value::DateTimeParseError>>,
}

impl DateTimeCmp {
    pub fn new(field: TemporalField, op: CmpOp, literal: String) -> Self {
        DateTimeCmp {
            field,
            op,
            literal,
            validated: OnceLock::new(),
        }
    }

    pub fn validate(&self) -> Result<(), crate::value::DateTimeParseError> {
        self.validated
            .get_or_init(|| match self.field {
                TemporalField::Date => crate::value::validate_partial_date(&self.literal)
                    .map(|_| ())
                    .map_err(|e| e),
                TemporalField::Time => crate::value::validate_partial_time(&self.literal)
                    .map(|_| ())
                    .map_err(|e| e),
            })
            .clone()
    }
}

/// A `LIKE`/`ILIKE`/`RLIKE` pattern, translated to a regex source string at
/// parse time and lazily compiled into a [`Regex`] on first evaluation,
/// cached on the node thereafter.
#[derive(Debug)]
pub struct PatternNode {
    /// Original pattern text, for error messages.
    pub source: String,
    /// Already-translated (escaped, anchored) regex source.
    pub translated: String,
    pub case_insensitive: bool,
    compiled: OnceLock<Regex>,
}

impl PatternNode {
    pub fn new(source: String, translated: String, case_insensitive: bool) -> Self {
        PatternNode {
            source,
            translated,
            case_insensitive,
            compiled: OnceLock::new(),
        }
    }

    /// Returns the compiled regex, compiling and caching it on first call.
    ///
    /// The typechecker validates `translated` compiles before the node is
    /// ever constructed (see `parser::typechecker`), so this never observes
    /// a compile failure in practice.
    pub fn regex(&self) -> &Regex {
        self.compiled.get_or_init(|| {
            RegexBuilder::new(&self.translated)
                .case_insensitive(self.case_insensitive)
                .build()
                .expect("pattern was validated at parse time")
        })
    }
}

/// A filter-language expression tree.
#[derive(Debug)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    DateTimeCmp(DateTimeCmp),
    Like(Box<Expr>, PatternNode),
    Rlike(Box<Expr>, PatternNode),
    In(Box<Expr>, Vec<Expr>),
    Between(Box<Expr>, Box<Expr>, Box<Expr>),
    IsNull(Box<Expr>, bool),
}

impl Expr {
    pub fn and(a: Expr, b: Expr) -> Expr {
        Expr::And(Box::new(a), Box::new(b))
    }
    pub fn or(a: Expr, b: Expr) -> Expr {
        Expr::Or(Box::new(a), Box::new(b))
    }
    pub fn not(a: Expr) -> Expr {
        Expr::Not(Box::new(a))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Not(e) => write!(f, "NOT ({e})"),
            Expr::And(a, b) => write!(f, "({a}) AND ({b})"),
            Expr::Or(a, b) => write!(f, "({a}) OR ({b})"),
            Expr::Cmp(op, a, b) => write!(f, "{a} {op} {b}"),
            Expr::DateTimeCmp(c) => write!(f, "{:?} {} '{}'", c.field, c.op, c.literal),
            Expr::Like(a, p) => write!(f, "{a} LIKE '{}'", p.source),
            Expr::Rlike(a, p) => write!(f, "{a} RLIKE '{}'", p.source),
            Expr::In(a, items) => write!(f, "{a} IN ({})", items.len()),
            Expr::Between(a, lo, hi) => write!(f, "{a} BETWEEN {lo} AND {hi}"),
            Expr::IsNull(a, negated) => {
                write!(f, "{a} IS {}NULL", if *negated { "NOT " } else { "" })
            }
        }
    }
}
