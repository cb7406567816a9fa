//! Parses and typechecks the WHERE-clause dialect into a
//! compiled [`crate::expr::Expr`] tree.

pub mod ast;
pub mod error;
pub mod raw;
pub mod typechecker;

use crate::expr::Expr;
use error::ParseError;

/// Parse and typecheck `src` into a compiled expression tree.
pub fn compile(src: &str) -> Result<Expr, ParseError> {
    let raw = raw::parse(src)?;
    typechecker::typecheck(&raw, src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_realistic_query() {
        let expr = compile(
            "size > 1M and ext2 in ('tar.gz', 'zip') and not (name like 'tmp%') and date >= today",
        );
        assert!(expr.is_ok());
    }
}
