//! Archive detection and member enumeration: decides whether
//! a path is a recognized archive container and, if so, lists its members
//! as candidate rows without extracting content.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone};
use thiserror::Error;

/// One of the four recognized archive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Tar,
    Zip,
    SevenZ,
    Rar,
}

impl ArchiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveKind::Tar => "tar",
            ArchiveKind::Zip => "zip",
            ArchiveKind::SevenZ => "7z",
            ArchiveKind::Rar => "rar",
        }
    }
}

/// Detect the archive kind from a filename suffix. Two-part tar suffixes
/// (`tar.gz`, `tgz`, ...) all resolve to `Tar`, since the tar reader
/// transparently handles the compression layer.
pub fn detect_kind(name: &str) -> Option<ArchiveKind> {
    let lower = name.to_lowercase();
    if lower.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else if lower.ends_with(".7z") {
        Some(ArchiveKind::SevenZ)
    } else if lower.ends_with(".rar") {
        Some(ArchiveKind::Rar)
    } else if lower.ends_with(".tar")
        || lower.ends_with(".tar.gz")
        || lower.ends_with(".tgz")
        || lower.ends_with(".tar.bz2")
        || lower.ends_with(".tbz2")
        || lower.ends_with(".tar.xz")
        || lower.ends_with(".txz")
    {
        Some(ArchiveKind::Tar)
    } else {
        None
    }
}

/// One member of an archive, pre-stat, not yet extracted.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub size: i64,
    pub mtime: DateTime<Local>,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{0}")]
    Io(String),
    #[error("{kind} support is not compiled into this build")]
    BackendUnavailable { kind: &'static str },
}

/// Which optional archive backends this build was compiled with, populated
/// once at walker construction so a missing optional backend is known up
/// front rather than discovered mid-walk.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub sevenz: bool,
    pub rar: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            sevenz: cfg!(feature = "archive-7z"),
            rar: cfg!(feature = "archive-rar"),
        }
    }
}

/// Tracks which archive kinds have already produced a "backend unavailable"
/// warning, so the sink gets exactly one message per kind per walk.
#[derive(Debug, Default)]
pub struct CapabilityWarnings {
    warned: RefCell<HashSet<ArchiveKind>>,
}

impl CapabilityWarnings {
    /// Returns `true` the first time `kind` is reported missing, `false` on
    /// every subsequent call for the same kind.
    pub fn should_warn(&self, kind: ArchiveKind) -> bool {
        self.warned.borrow_mut().insert(kind)
    }
}

/// Open `path` as an archive of the given `kind` and enumerate its members.
/// Directory members are filtered out.
pub fn list_members(
    path: &Path,
    kind: ArchiveKind,
    caps: Capabilities,
) -> Result<Vec<Member>, ArchiveError> {
    match kind {
        ArchiveKind::Tar => list_tar_members(path),
        ArchiveKind::Zip => list_zip_members(path),
        ArchiveKind::SevenZ => {
            if !caps.sevenz {
                return Err(ArchiveError::BackendUnavailable { kind: "7z" });
            }
            list_sevenz_members(path)
        }
        ArchiveKind::Rar => {
            if !caps.rar {
                return Err(ArchiveError::BackendUnavailable { kind: "rar" });
            }
            list_rar_members(path)
        }
    }
}

fn list_tar_members(path: &Path) -> Result<Vec<Member>, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::Io(e.to_string()))?;
    let reader: Box<dyn Read> = match path.to_string_lossy().to_lowercase() {
        p if p.ends_with(".gz") || p.ends_with(".tgz") => {
            Box::new(flate2::read::GzDecoder::new(file))
        }
        p if p.ends_with(".bz2") || p.ends_with(".tbz2") => Box::new(bzip2::read::BzDecoder::new(file)),
        p if p.ends_with(".xz") || p.ends_with(".txz") => {
            Box::new(xz2::read::XzDecoder::new(file))
        }
        _ => Box::new(file),
    };
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|e| ArchiveError::Io(e.to_string()))?;

    let mut members = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ArchiveError::Io(e.to_string()))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| ArchiveError::Io(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let size = entry.header().size().unwrap_or(0) as i64;
        let mtime = entry
            .header()
            .mtime()
            .ok()
            .and_then(|secs| Local.timestamp_opt(secs as i64, 0).single())
            .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap());
        members.push(Member { name, size, mtime });
    }
    Ok(members)
}

fn list_zip_members(path: &Path) -> Result<Vec<Member>, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::Io(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Io(e.to_string()))?;

    let mut members = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i).map_err(|e| ArchiveError::Io(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let size = entry.size() as i64;
        let mtime = zip_datetime_to_local(entry.last_modified());
        members.push(Member { name, size, mtime });
    }
    Ok(members)
}

fn zip_datetime_to_local(dt: zip::DateTime) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(
            dt.year() as i32,
            dt.month() as u32,
            dt.day() as u32,
            dt.hour() as u32,
            dt.minute() as u32,
            dt.second() as u32,
        )
        .single()
        .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap())
}

#[cfg(feature = "archive-7z")]
fn list_sevenz_members(path: &Path) -> Result<Vec<Member>, ArchiveError> {
    let mut file = File::open(path).map_err(|e| ArchiveError::Io(e.to_string()))?;
    let archive = sevenz_rust::Archive::read(&mut file, &mut sevenz_rust::Password::empty())
        .map_err(|e| ArchiveError::Io(e.to_string()))?;
    let mut members = Vec::new();
    for entry in archive.files.iter() {
        if entry.is_directory() {
            continue;
        }
        members.push(Member {
            name: entry.name().to_string(),
            size: entry.size() as i64,
            mtime: Local.timestamp_opt(0, 0).single().unwrap(),
        });
    }
    Ok(members)
}

#[cfg(not(feature = "archive-7z"))]
fn list_sevenz_members(_path: &Path) -> Result<Vec<Member>, ArchiveError> {
    Err(ArchiveError::BackendUnavailable { kind: "7z" })
}

#[cfg(feature = "archive-rar")]
fn list_rar_members(path: &Path) -> Result<Vec<Member>, ArchiveError> {
    let archive = unrar::Archive::new(path)
        .open_for_listing()
        .map_err(|e| ArchiveError::Io(e.to_string()))?;
    let mut members = Vec::new();
    for entry in archive {
        let entry = entry.map_err(|e| ArchiveError::Io(e.to_string()))?;
        if entry.is_directory() {
            continue;
        }
        members.push(Member {
            name: entry.filename.to_string_lossy().into_owned(),
            size: entry.unpacked_size as i64,
            mtime: Local.timestamp_opt(0, 0).single().unwrap(),
        });
    }
    Ok(members)
}

#[cfg(not(feature = "archive-rar"))]
fn list_rar_members(_path: &Path) -> Result<Vec<Member>, ArchiveError> {
    Err(ArchiveError::BackendUnavailable { kind: "rar" })
}
