//! Raw AST produced straight from the grammar, before typechecking resolves
//! predicate forms into the typed [`crate::expr::Expr`] tree. Keeps the raw
//! and typed trees separate, but stores plain byte offsets instead of
//! borrowed `Span`s so the raw tree doesn't need to carry the source
//! lifetime around.

use miette::SourceSpan;

/// A byte-offset range into the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub start: usize,
    pub end: usize,
}

impl Loc {
    pub fn from_span(span: pest::Span) -> Self {
        Loc {
            start: span.start(),
            end: span.end(),
        }
    }

    pub fn to_source_span(self) -> SourceSpan {
        (self.start, self.end.saturating_sub(self.start).max(1)).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A `term`: an identifier or one of the four literal forms.
#[derive(Debug, Clone)]
pub enum RawTerm {
    Ident(String, Loc),
    Number(String, Loc),
    SizeNumber(String, Loc),
    String(String, Loc),
    Bool(bool, Loc),
}

impl RawTerm {
    pub fn loc(&self) -> Loc {
        match self {
            RawTerm::Ident(_, l)
            | RawTerm::Number(_, l)
            | RawTerm::SizeNumber(_, l)
            | RawTerm::String(_, l)
            | RawTerm::Bool(_, l) => *l,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RawPredicate {
    Cmp {
        op: RawCmpOp,
        left: RawTerm,
        right: RawTerm,
    },
    Like {
        left: RawTerm,
        pattern: RawTerm,
        case_insensitive: bool,
    },
    Rlike {
        left: RawTerm,
        pattern: RawTerm,
    },
    In {
        left: RawTerm,
        items: Vec<RawTerm>,
        negated: bool,
    },
    Between {
        left: RawTerm,
        lo: RawTerm,
        hi: RawTerm,
        negated: bool,
    },
    IsNull {
        left: RawTerm,
        negated: bool,
    },
    Truthy {
        term: RawTerm,
    },
}

#[derive(Debug, Clone)]
pub enum RawExpr {
    Not(Box<RawExpr>),
    And(Box<RawExpr>, Box<RawExpr>),
    Or(Box<RawExpr>, Box<RawExpr>),
    Predicate(RawPredicate, Loc),
}
