use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use slog::{o, Logger};

use sift::parser;
use sift::row::TemporalContext;
use sift::walker::{Policy, Walker};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// WHERE-style filter expression, e.g. "size > 1M and ext = 'log'"
    expr: String,

    /// Directories or files to search
    #[clap(default_value = ".")]
    roots: Vec<PathBuf>,

    /// Follow symlinks into the directories they point to
    #[clap(long)]
    follow_symlinks: bool,

    /// Don't descend into zip/tar/7z/rar containers
    #[clap(long)]
    no_archive: bool,

    /// Abort the walk on the first traversal error instead of skipping it
    #[clap(long)]
    stop_on_error: bool,
}

pub fn main() -> Result<ExitCode, anyhow::Error> {
    let args = Args::parse();

    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let logger = Logger::root(drain, o!());

    let expr = parser::compile(&args.expr).context("failed to compile expression")?;
    let ctx = TemporalContext::default();

    let policy = Policy {
        follow_symlinks: args.follow_symlinks,
        no_archive: args.no_archive,
        stop_on_error: args.stop_on_error,
        error_sink: Box::new(|message: &str| eprintln!("sift: {message}")),
        ..Policy::default()
    };

    let walker = Walker::new(logger, args.roots, &expr, policy, &ctx);

    let mut found_any = false;
    for hit in walker {
        found_any = true;
        println!("{}", hit.path);
    }

    Ok(if found_any {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
