//! The candidate row: the immutable attribute bag tested against a compiled
//! expression.

use chrono::{DateTime, Datelike, Local, TimeZone, Weekday};

use crate::value::Value;

/// One of `file`, `dir`, `link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Link,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Link => "link",
        }
    }
}

/// Recognized compound extensions for the `ext2` field.
const COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "tar.bz2", "tar.xz"];

/// Lowercase `name` and split it into `(ext, ext2)`:
/// `ext` is the last dot-suffix, `ext2` is the longest recognized compound
/// suffix or falls back to `ext`.
pub fn derive_extensions(name: &str) -> (String, String) {
    let lower = name.to_lowercase();

    let ext = lower
        .rsplit_once('.')
        .map(|(_, suffix)| suffix.to_string())
        .unwrap_or_default();

    let ext2 = COMPOUND_EXTENSIONS
        .iter()
        .find(|&&compound| lower.ends_with(&format!(".{compound}")))
        .map(|compound| compound.to_string())
        .unwrap_or_else(|| ext.clone());

    (ext, ext2)
}

/// `today` plus the most recent occurrence (<= today) of each weekday,
/// captured once per walker construction so every row sees the same clock.
#[derive(Debug, Clone)]
pub struct TemporalContext {
    pub today: String,
    weekday_anchors: [String; 7], // indexed by chrono::Weekday::num_days_from_monday()
}

impl TemporalContext {
    pub fn capture(now: DateTime<Local>) -> Self {
        let today_date = now.date_naive();
        let today = today_date.format("%Y-%m-%d").to_string();

        let mut weekday_anchors: [String; 7] = Default::default();
        for (i, anchor) in weekday_anchors.iter_mut().enumerate() {
            let target = Weekday::try_from(i as u8).expect("0..7 are valid weekday indices");
            let offset = (today_date.weekday().num_days_from_monday() as i64
                - target.num_days_from_monday() as i64)
                .rem_euclid(7);
            let most_recent = today_date - chrono::Duration::days(offset);
            *anchor = most_recent.format("%Y-%m-%d").to_string();
        }

        TemporalContext {
            today,
            weekday_anchors,
        }
    }

    /// Look up `mo`, `tu`, `we`, `th`, `fr`, `sa`, `su`.
    pub fn weekday_anchor(&self, name: &str) -> Option<&str> {
        let idx = match name {
            "mo" => 0,
            "tu" => 1,
            "we" => 2,
            "th" => 3,
            "fr" => 4,
            "sa" => 5,
            "su" => 6,
            _ => return None,
        };
        Some(&self.weekday_anchors[idx])
    }
}

impl Default for TemporalContext {
    fn default() -> Self {
        Self::capture(Local::now())
    }
}

/// The immutable attribute bag describing one filesystem entry or archive
/// member.
#[derive(Debug, Clone)]
pub struct Row<'ctx> {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub date: String,
    pub time: String,
    pub ext: String,
    pub ext2: String,
    pub kind: EntryKind,
    pub archive: String,
    pub container: String,
    ctx: &'ctx TemporalContext,
}

impl<'ctx> Row<'ctx> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        path: String,
        size: i64,
        mtime: DateTime<Local>,
        kind: EntryKind,
        archive: String,
        container: String,
        ctx: &'ctx TemporalContext,
    ) -> Self {
        let (ext, ext2) = derive_extensions(&name);
        Row {
            date: mtime.format("%Y-%m-%d").to_string(),
            time: mtime.format("%H:%M:%S").to_string(),
            name,
            path,
            size,
            ext,
            ext2,
            kind,
            archive,
            container,
            ctx,
        }
    }

    /// Resolve an identifier by name. Unknown identifiers yield [`Value::Null`]
    /// per the evaluator's policy for a missing identifier.
    pub fn get(&self, name: &str) -> Value {
        match name {
            "name" => Value::Text(self.name.clone()),
            "path" => Value::Text(self.path.clone()),
            "size" => Value::Int(self.size),
            "date" => Value::Text(self.date.clone()),
            "time" => Value::Text(self.time.clone()),
            "ext" => Value::Text(self.ext.clone()),
            "ext2" => Value::Text(self.ext2.clone()),
            "type" => Value::Text(self.kind.as_str().to_string()),
            "archive" => Value::Text(self.archive.clone()),
            "container" => Value::Text(self.container.clone()),
            "today" => Value::Text(self.ctx.today.clone()),
            other => match self.ctx.weekday_anchor(other) {
                Some(anchor) => Value::Text(anchor.to_string()),
                None => Value::Null,
            },
        }
    }
}

/// Attribute names that compare case-insensitively.
pub fn is_case_insensitive_identifier(name: &str) -> bool {
    matches!(name, "name" | "path" | "ext" | "ext2")
}

/// Every identifier the evaluator understands, used for typo suggestions at
/// parse time: unknown identifiers are only rejected when they look like an
/// obvious misspelling of one of these.
pub const KNOWN_IDENTIFIERS: &[&str] = &[
    "name", "path", "size", "date", "time", "ext", "ext2", "type", "archive", "container",
    "today", "mo", "tu", "we", "th", "fr", "sa", "su",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ext2_recognizes_compound_suffixes() {
        assert_eq!(derive_extensions("archive.tar.gz"), ("gz".into(), "tar.gz".into()));
        assert_eq!(derive_extensions("archive.tar"), ("tar".into(), "tar".into()));
        assert_eq!(derive_extensions("archive.gz"), ("gz".into(), "gz".into()));
        assert_eq!(derive_extensions("README"), ("".into(), "".into()));
        assert_eq!(derive_extensions("Data.TAR.GZ"), ("gz".into(), "tar.gz".into()));
    }

    #[test]
    fn weekday_anchors_are_at_or_before_today() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(); // Wednesday
        let ctx = TemporalContext::capture(now);
        assert_eq!(ctx.today, "2025-01-15");
        assert_eq!(ctx.weekday_anchor("we").unwrap(), "2025-01-15");
        assert_eq!(ctx.weekday_anchor("tu").unwrap(), "2025-01-14");
        assert_eq!(ctx.weekday_anchor("th").unwrap(), "2025-01-09");
        assert_eq!(ctx.weekday_anchor("su").unwrap(), "2025-01-12");
    }
}
