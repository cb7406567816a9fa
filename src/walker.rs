//! The walker: a pull-based iterator over a directory tree (and, where
//! applicable, archive members) that evaluates a compiled expression against
//! each candidate row and yields matches.

use std::collections::{HashSet, VecDeque};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use slog::{debug, warn, Logger};

use crate::archive::{self, ArchiveKind, CapabilityWarnings, Capabilities};
use crate::expr::Expr;
use crate::row::{EntryKind, Row, TemporalContext};

/// Configuration passed to a [`Walker`].
pub struct Policy {
    pub follow_symlinks: bool,
    pub no_archive: bool,
    pub stop_on_error: bool,
    pub archive_separator: String,
    pub error_sink: Box<dyn FnMut(&str)>,
    pub now: DateTime<Local>,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            follow_symlinks: false,
            no_archive: false,
            stop_on_error: false,
            archive_separator: "//".to_string(),
            error_sink: Box::new(|_: &str| {}),
            now: Local::now(),
        }
    }
}

/// A snapshot of a matched row, in the canonical field order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub name: String,
    pub path: String,
    pub container: String,
    pub size: i64,
    pub mtime_date: String,
    pub mtime_time: String,
    pub ext: String,
    pub ext2: String,
    pub r#type: String,
    pub archive: String,
}

impl<'ctx> From<&Row<'ctx>> for MatchRecord {
    fn from(row: &Row<'ctx>) -> Self {
        MatchRecord {
            name: row.name.clone(),
            path: row.path.clone(),
            container: row.container.clone(),
            size: row.size,
            mtime_date: row.date.clone(),
            mtime_time: row.time.clone(),
            ext: row.ext.clone(),
            ext2: row.ext2.clone(),
            r#type: row.kind.as_str().to_string(),
            archive: row.archive.clone(),
        }
    }
}

#[derive(PartialEq, Eq)]
enum FrameState {
    EmittingFiles,
    DescendingSubdirs,
}

/// One open directory: `Opened -> EmittingFiles -> DescendingSubdirs ->
/// Closed`. Entries are pre-stat'd and split into files and
/// subdirectories at open time so files can be emitted before any recursion,
/// matching the files-before-dirs sibling order. `Closed` is implicit: the
/// frame is popped once exhausted.
struct Frame {
    files: Vec<(PathBuf, Metadata)>,
    subdirs: Vec<(PathBuf, Metadata)>,
    file_idx: usize,
    subdir_idx: usize,
    state: FrameState,
}

#[cfg(unix)]
type VisitedKey = (u64, u64);
#[cfg(not(unix))]
type VisitedKey = PathBuf;

#[cfg(unix)]
fn visited_key(path: &Path, meta: &Metadata) -> VisitedKey {
    use std::os::unix::fs::MetadataExt;
    let _ = path;
    (meta.dev(), meta.ino())
}

#[cfg(not(unix))]
fn visited_key(path: &Path, _meta: &Metadata) -> VisitedKey {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Drives the depth-first traversal.
pub struct Walker<'ctx> {
    logger: Logger,
    expr: &'ctx Expr,
    policy: Policy,
    ctx: &'ctx TemporalContext,
    caps: Capabilities,
    warnings: CapabilityWarnings,
    roots: VecDeque<PathBuf>,
    frames: Vec<Frame>,
    visited: HashSet<VisitedKey>,
    pending: VecDeque<MatchRecord>,
    stopped: bool,
}

impl<'ctx> Walker<'ctx> {
    pub fn new(
        logger: Logger,
        roots: Vec<PathBuf>,
        expr: &'ctx Expr,
        policy: Policy,
        ctx: &'ctx TemporalContext,
    ) -> Self {
        Walker {
            logger,
            expr,
            policy,
            ctx,
            caps: Capabilities::default(),
            warnings: CapabilityWarnings::default(),
            roots: roots.into(),
            frames: Vec::new(),
            visited: HashSet::new(),
            pending: VecDeque::new(),
            stopped: false,
        }
    }

    fn report(&mut self, path: &Path, message: &str) {
        warn!(self.logger, "traversal error"; "path" => %path.display(), "message" => message);
        let text = format!("{}: {message}", path.display());
        (self.policy.error_sink)(&text);
        if self.policy.stop_on_error {
            self.stopped = true;
        }
    }

    /// Open the next root, queuing it either as a single-file match check
    /// or as a directory frame. Returns `true` once something is ready
    /// (a pushed frame or a pending match).
    fn advance_roots(&mut self) -> bool {
        while let Some(root) = self.roots.pop_front() {
            let meta = match fs::symlink_metadata(&root) {
                Ok(m) => m,
                Err(e) => {
                    self.report(&root, &e.to_string());
                    continue;
                }
            };
            if meta.is_dir() {
                let key = visited_key(&root, &meta);
                if !self.visited.insert(key) {
                    continue;
                }
                if let Some(frame) = self.open_dir(&root) {
                    self.frames.push(frame);
                    return true;
                }
                continue;
            }
            self.emit_file_entry(&root, &meta);
            if !self.pending.is_empty() {
                return true;
            }
        }
        false
    }

    fn open_dir(&mut self, dir: &Path) -> Option<Frame> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                self.report(dir, &e.to_string());
                return None;
            }
        };

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    self.report(dir, &e.to_string());
                    continue;
                }
            };
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    self.report(&path, &e.to_string());
                    continue;
                }
            };
            if meta.is_dir() {
                // A real directory: its own row is tested right before
                // recursion (see DescendingSubdirs in `next`), not here.
                subdirs.push((path, meta));
                continue;
            }

            if meta.is_symlink() && self.policy.follow_symlinks {
                if let Ok(target_meta) = fs::metadata(&path) {
                    if target_meta.is_dir() {
                        // Tested as a link below, and separately queued for
                        // descent (links to directories are
                        // both emitted as `type=link` and traversed).
                        subdirs.push((path.clone(), meta.clone()));
                    }
                }
            }
            files.push((path, meta));
        }
        files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
        subdirs.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));

        Some(Frame {
            files,
            subdirs,
            file_idx: 0,
            subdir_idx: 0,
            state: FrameState::EmittingFiles,
        })
    }

    /// Build a row for a disk entry, evaluate it, queue a match if it hits,
    /// and (for regular files, when archive descent is enabled) probe for
    /// archive members.
    fn emit_file_entry(&mut self, path: &Path, meta: &Metadata) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let kind = if meta.is_symlink() {
            EntryKind::Link
        } else {
            EntryKind::File
        };
        let size = meta.len() as i64;
        let mtime = meta
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or(self.policy.now);

        let row = Row::new(
            name,
            path.to_string_lossy().into_owned(),
            size,
            mtime,
            kind,
            String::new(),
            String::new(),
            self.ctx,
        );

        let is_match = self.eval_row(&row, path);
        debug!(self.logger, "visited entity"; "path" => %path.display(), "result" => is_match);
        if is_match {
            self.pending.push_back(MatchRecord::from(&row));
        }

        if kind == EntryKind::File && !self.policy.no_archive {
            self.probe_archive(path, &row.name);
        }
    }

    /// Build and test the row for a real (non-symlink) directory, right
    /// before recursing into it.
    fn emit_dir_entry(&mut self, path: &Path, meta: &Metadata) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let mtime = meta
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or(self.policy.now);

        let row = Row::new(
            name,
            path.to_string_lossy().into_owned(),
            0,
            mtime,
            EntryKind::Dir,
            String::new(),
            String::new(),
            self.ctx,
        );

        let is_match = self.eval_row(&row, path);
        debug!(self.logger, "visited entity"; "path" => %path.display(), "result" => is_match);
        if is_match {
            self.pending.push_back(MatchRecord::from(&row));
        }
    }

    fn probe_archive(&mut self, path: &Path, name: &str) {
        let Some(kind) = archive::detect_kind(name) else {
            return;
        };
        match archive::list_members(path, kind, self.caps) {
            Ok(members) => self.emit_archive_members(path, kind, members),
            Err(archive::ArchiveError::BackendUnavailable { kind: kind_name }) => {
                if self.warnings.should_warn(kind) {
                    self.report(path, &format!("{kind_name} support is not available"));
                }
            }
            Err(e) => self.report(path, &e.to_string()),
        }
    }

    fn emit_archive_members(
        &mut self,
        container: &Path,
        kind: ArchiveKind,
        members: Vec<archive::Member>,
    ) {
        let container_path = container.to_string_lossy().into_owned();
        for member in members {
            let basename = member
                .name
                .rsplit('/')
                .next()
                .unwrap_or(&member.name)
                .to_string();
            let path = format!(
                "{container_path}{}{}",
                self.policy.archive_separator, member.name
            );

            let row = Row::new(
                basename,
                path,
                member.size,
                member.mtime,
                EntryKind::File,
                kind.as_str().to_string(),
                container_path.clone(),
                self.ctx,
            );

            if self.eval_row(&row, container) {
                self.pending.push_back(MatchRecord::from(&row));
            }
        }
    }

    /// Evaluate `row` against the compiled expression. An `EvalError` (a
    /// type-mismatch comparison or a malformed date/time literal) is a query
    /// error, not a traversal error: it is fatal regardless of the
    /// stop-on-error policy, so the walk always terminates on the first one.
    fn eval_row(&mut self, row: &Row, path: &Path) -> bool {
        match crate::eval::eval(self.expr, row) {
            Ok(tri) => tri.is_match(),
            Err(e) => {
                self.report(path, &e.to_string());
                self.stopped = true;
                false
            }
        }
    }

    /// Decide whether to descend into the subdirectory entry at `path`,
    /// given the symlink policy, and open a frame if so.
    ///
    /// Every directory actually entered — not just symlink targets — is
    /// recorded in the visited set before opening it, keyed by the real
    /// directory's device+inode. This is what keeps a symlink that loops
    /// back to an ancestor directory from re-opening (and re-emitting) it:
    /// the ancestor was already marked visited the first time it was
    /// entered, whether that was through a symlink or not.
    fn try_descend(&mut self, path: &Path, lstat_meta: &Metadata) -> Option<Frame> {
        let target_meta = if lstat_meta.is_symlink() {
            if !self.policy.follow_symlinks {
                return None;
            }
            match fs::metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    self.report(path, &e.to_string());
                    return None;
                }
            }
        } else {
            lstat_meta.clone()
        };

        if !target_meta.is_dir() {
            return None;
        }
        let key = visited_key(path, &target_meta);
        if !self.visited.insert(key) {
            return None;
        }

        self.open_dir(path)
    }
}

impl<'ctx> Iterator for Walker<'ctx> {
    type Item = MatchRecord;

    fn next(&mut self) -> Option<MatchRecord> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(record);
            }
            if self.stopped {
                return None;
            }

            if self.frames.is_empty() {
                if !self.advance_roots() {
                    return None;
                }
                continue;
            }

            let top = self.frames.len() - 1;
            match self.frames[top].state {
                FrameState::EmittingFiles => {
                    let idx = self.frames[top].file_idx;
                    if idx >= self.frames[top].files.len() {
                        self.frames[top].state = FrameState::DescendingSubdirs;
                        continue;
                    }
                    let (path, meta) = self.frames[top].files[idx].clone();
                    self.frames[top].file_idx += 1;
                    self.emit_file_entry(&path, &meta);
                }
                FrameState::DescendingSubdirs => {
                    let idx = self.frames[top].subdir_idx;
                    if idx >= self.frames[top].subdirs.len() {
                        self.frames.pop();
                        continue;
                    }
                    let (path, meta) = self.frames[top].subdirs[idx].clone();
                    self.frames[top].subdir_idx += 1;
                    if !meta.is_symlink() {
                        // A real directory's own row (already tested as a
                        // link in EmittingFiles if it's a symlink) is tested
                        // once, right before recursion.
                        self.emit_dir_entry(&path, &meta);
                    }
                    if let Some(child) = self.try_descend(&path, &meta) {
                        self.frames.push(child);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use std::fs as stdfs;
    use tempdir::TempDir;

    fn walk_all(dir: &Path, expr_src: &str) -> Vec<MatchRecord> {
        let expr = parser::compile(expr_src).unwrap();
        let ctx = TemporalContext::default();
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let policy = Policy::default();
        let walker = Walker::new(logger, vec![dir.to_path_buf()], &expr, policy, &ctx);
        walker.collect()
    }

    #[test]
    fn finds_file_above_size_threshold() {
        let tmp = TempDir::new("sift-walker").unwrap();
        stdfs::write(tmp.path().join("a.txt"), vec![0u8; 10]).unwrap();
        stdfs::write(tmp.path().join("b.log"), vec![0u8; 2000]).unwrap();

        let matches = walk_all(tmp.path(), "size > 1K");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "b.log");
    }

    #[test]
    fn ext2_matches_compound_suffix_only() {
        let tmp = TempDir::new("sift-walker").unwrap();
        stdfs::write(tmp.path().join("data.tar.gz"), b"x").unwrap();
        stdfs::write(tmp.path().join("data.tar"), b"x").unwrap();
        stdfs::write(tmp.path().join("data.gz"), b"x").unwrap();

        let matches = walk_all(tmp.path(), "ext2 = 'tar.gz'");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "data.tar.gz");
    }

    #[test]
    fn descends_into_subdirectories() {
        let tmp = TempDir::new("sift-walker").unwrap();
        stdfs::create_dir(tmp.path().join("sub")).unwrap();
        stdfs::write(tmp.path().join("sub").join("deep.txt"), b"x").unwrap();

        let matches = walk_all(tmp.path(), "name = 'deep.txt'");
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn symlink_cycle_is_visited_once_when_followed() {
        let tmp = TempDir::new("sift-walker").unwrap();
        let a = tmp.path().join("a");
        stdfs::create_dir(&a).unwrap();
        stdfs::write(a.join("f.txt"), b"x").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(&a, a.join("self")).unwrap();

        let expr = parser::compile("1").unwrap();
        let ctx = TemporalContext::default();
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let mut policy = Policy::default();
        policy.follow_symlinks = true;
        let walker = Walker::new(logger, vec![tmp.path().to_path_buf()], &expr, policy, &ctx);
        let matches: Vec<_> = walker.collect();
        // f.txt is visited exactly once even though `a/self` loops back to `a`.
        assert_eq!(matches.iter().filter(|m| m.name == "f.txt").count(), 1);
    }

    #[test]
    fn eval_type_mismatch_terminates_the_walk_even_without_stop_on_error() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let tmp = TempDir::new("sift-walker").unwrap();
        stdfs::write(tmp.path().join("a.txt"), b"x").unwrap();
        stdfs::write(tmp.path().join("b.txt"), b"x").unwrap();
        stdfs::write(tmp.path().join("c.txt"), b"x").unwrap();

        // `size` is always an int; comparing it to a string literal is a
        // type mismatch on every row.
        let expr = parser::compile("size > 'big'").unwrap();
        let ctx = TemporalContext::default();
        let logger = slog::Logger::root(slog::Discard, slog::o!());

        let sink_calls = Rc::new(RefCell::new(0));
        let sink_calls_inner = Rc::clone(&sink_calls);
        let mut policy = Policy::default();
        policy.stop_on_error = false;
        policy.error_sink = Box::new(move |_msg: &str| {
            *sink_calls_inner.borrow_mut() += 1;
        });

        let walker = Walker::new(logger, vec![tmp.path().to_path_buf()], &expr, policy, &ctx);
        let matches: Vec<_> = walker.collect();

        assert!(matches.is_empty());
        // Stops after the first row's eval error instead of reporting once
        // per file and continuing the walk.
        assert_eq!(*sink_calls.borrow(), 1);
    }
}
