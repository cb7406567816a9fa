//! Parse-time errors: `thiserror` + `miette` diagnostics with spans into the
//! original source.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use super::ast::Loc;
use super::raw::Rule;

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ParseError {
    #[error("syntax error")]
    #[diagnostic(code(sift::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
    },

    #[error("unknown identifier '{name}'")]
    #[diagnostic(code(sift::unknown_identifier), help("{help}"))]
    UnknownIdentifier {
        name: String,
        #[source_code]
        src: String,
        #[label("unknown identifier")]
        span: SourceSpan,
        help: String,
    },

    #[error("invalid size literal '{text}': {reason}")]
    #[diagnostic(code(sift::invalid_size), help("sizes use B/K/M/G/T suffixes, e.g. 10K, 5M"))]
    InvalidSize {
        text: String,
        reason: String,
        #[source_code]
        src: String,
        #[label("{reason}")]
        span: SourceSpan,
    },

    #[error("invalid regular expression '{text}': {reason}")]
    #[diagnostic(code(sift::invalid_pattern))]
    InvalidPattern {
        text: String,
        reason: String,
        #[source_code]
        src: String,
        #[label("{reason}")]
        span: SourceSpan,
    },

    #[error("{context} must be a string literal")]
    #[diagnostic(code(sift::expected_string_literal))]
    ExpectedStringLiteral {
        context: String,
        #[source_code]
        src: String,
        #[label("expected a quoted string")]
        span: SourceSpan,
    },
}

impl ParseError {
    pub(crate) fn from_pest(err: pest::error::Error<Rule>, src: &str) -> Self {
        let (start, end) = match err.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        ParseError::Syntax {
            src: src.to_string(),
            span: (start, end.saturating_sub(start).max(1)).into(),
            message: err.variant.message().to_string(),
        }
    }

    pub(crate) fn unknown_identifier(name: &str, loc: Loc, src: &str) -> Self {
        let help = match suggest_identifier(name) {
            Some(suggestion) => format!("did you mean '{suggestion}'?"),
            None => format!(
                "valid identifiers: {}",
                crate::row::KNOWN_IDENTIFIERS.join(", ")
            ),
        };
        ParseError::UnknownIdentifier {
            name: name.to_string(),
            src: src.to_string(),
            span: loc.to_source_span(),
            help,
        }
    }
}

/// Suggest a known identifier close to `name` (edit distance <= 2), used for
/// "obvious misspelling" rejection at parse time.
pub fn suggest_identifier(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    crate::row::KNOWN_IDENTIFIERS
        .iter()
        .map(|&known| (known, edit_distance(&lower, known)))
        .filter(|(_, d)| *d <= 2)
        .min_by_key(|(_, d)| *d)
        .map(|(known, _)| known)
}

/// Whether `name` is close enough to a known identifier to be treated as an
/// obvious misspelling rather than a deliberately unknown attribute.
pub fn looks_like_misspelling(name: &str) -> bool {
    suggest_identifier(name).is_some() && !crate::row::KNOWN_IDENTIFIERS.contains(&name)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
