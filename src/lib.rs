//! A file-finding engine: compiles an SQL-WHERE-style predicate and walks a
//! set of filesystem roots (transparently descending into archive
//! containers) for the matching entries.
//!
//! ```no_run
//! # use std::path::PathBuf;
//! let expr = sift::parser::compile("size > 1M and ext = 'log'").unwrap();
//! let ctx = sift::row::TemporalContext::default();
//! let logger = slog::Logger::root(slog::Discard, slog::o!());
//! let policy = sift::walker::Policy::default();
//! let walker = sift::walker::Walker::new(logger, vec![PathBuf::from(".")], &expr, policy, &ctx);
//! for hit in walker {
//!     println!("{}", hit.path);
//! }
//! ```

pub mod archive;
pub mod error;
pub mod eval;
pub mod expr;
pub mod parser;
pub mod pattern;
pub mod row;
pub mod value;
pub mod walker;

pub use error::QueryError;
