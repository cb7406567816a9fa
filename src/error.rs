//! Crate-wide error type: query errors (parse + eval) are fatal and bubble
//! to the caller; traversal errors are non-fatal and routed through the
//! policy's error sink instead.

use thiserror::Error;

use crate::eval::EvalError;
use crate::parser::error::ParseError;

/// Errors fatal to a query: rejected at parse time, or a type mismatch
/// discovered during evaluation.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
