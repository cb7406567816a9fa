use std::fs;
use std::io::Write as _;

use chrono::{Duration, Local};
use sift::parser;
use sift::row::TemporalContext;
use sift::walker::{Policy, Walker};
use tempdir::TempDir;

struct Case {
    expr: &'static str,
    expected: &'static [&'static str],
    files: &'static [(&'static str, usize)],
}

impl Case {
    fn run(&self) {
        let tmp = TempDir::new("sift-integration").unwrap();
        for (name, size) in self.files {
            fs::write(tmp.path().join(name), vec![0u8; *size]).unwrap();
        }

        let expr = parser::compile(self.expr).expect("expression compiles");
        let ctx = TemporalContext::default();
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let policy = Policy::default();
        let walker = Walker::new(logger, vec![tmp.path().to_path_buf()], &expr, policy, &ctx);

        let mut got: Vec<String> = walker.map(|m| m.name).collect();
        got.sort();
        let mut want: Vec<String> = self.expected.iter().map(|s| s.to_string()).collect();
        want.sort();
        assert_eq!(got, want, "query {:?} over {:?}", self.expr, self.files);
    }
}

#[test]
fn s1_size_threshold() {
    Case {
        expr: "size > 1K",
        expected: &["b.log"],
        files: &[("a.txt", 10), ("b.log", 2000)],
    }
    .run();
}

#[test]
fn s3_ilike_is_case_insensitive() {
    Case {
        expr: "name ilike 'README%'",
        expected: &["README.md", "readme.txt"],
        files: &[("readme.txt", 1), ("README.md", 1), ("notes.txt", 1)],
    }
    .run();
}

#[test]
fn s4_ext2_matches_compound_suffix_only() {
    Case {
        expr: "ext2 = 'tar.gz'",
        expected: &["data.tar.gz"],
        files: &[("data.tar.gz", 1), ("data.tar", 1), ("data.gz", 1)],
    }
    .run();
}

#[test]
fn s6_in_and_not_between() {
    Case {
        expr: "ext in ('jpg', 'png') and not (size between 0 and 1K)",
        expected: &["b.jpg", "c.png"],
        files: &[
            ("a.jpg", 500),
            ("b.jpg", 2000),
            ("c.png", 2000),
            ("d.gif", 5000),
        ],
    }
    .run();
}

#[test]
fn s2_archive_member_matches_inside_zip() {
    let tmp = TempDir::new("sift-integration").unwrap();
    let archive_path = tmp.path().join("p.zip");
    {
        let file = fs::File::create(&archive_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("r.md", options).unwrap();
        zip.write_all(&vec![0u8; 5]).unwrap();
        zip.start_file("s.md", options).unwrap();
        zip.write_all(&vec![0u8; 5000]).unwrap();
        zip.finish().unwrap();
    }

    let expr = parser::compile("ext = 'md' and size > 1K").unwrap();
    let ctx = TemporalContext::default();
    let logger = slog::Logger::root(slog::Discard, slog::o!());
    let policy = Policy::default();
    let walker = Walker::new(logger, vec![tmp.path().to_path_buf()], &expr, policy, &ctx);
    let matches: Vec<_> = walker.collect();

    assert_eq!(matches.len(), 1);
    assert!(matches[0].path.ends_with("p.zip//s.md"));
    assert_eq!(matches[0].archive, "zip");
    assert!(matches[0].container.ends_with("p.zip"));
}

#[test]
fn s5_date_equals_today_excludes_yesterday() {
    let tmp = TempDir::new("sift-integration").unwrap();
    let today_file = tmp.path().join("today.txt");
    let yesterday_file = tmp.path().join("yesterday.txt");
    fs::write(&today_file, b"x").unwrap();
    fs::write(&yesterday_file, b"x").unwrap();

    let now = Local::now();
    let yesterday = now - Duration::days(1);
    set_mtime(&yesterday_file, yesterday);
    set_mtime(&today_file, now);

    let expr = parser::compile("date = today").unwrap();
    let ctx = TemporalContext::capture(now);
    let logger = slog::Logger::root(slog::Discard, slog::o!());
    let mut policy = Policy::default();
    policy.now = now;
    let walker = Walker::new(logger, vec![tmp.path().to_path_buf()], &expr, policy, &ctx);
    let matches: Vec<_> = walker.map(|m| m.name).collect();

    assert_eq!(matches, vec!["today.txt".to_string()]);
}

fn set_mtime(path: &std::path::Path, time: chrono::DateTime<Local>) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(time.into()).unwrap();
}
