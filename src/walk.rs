//! Input tree walker.
//!
//! Walks each root physically (symlinks are never followed), visiting
//! `Attic` before its siblings so dead files are parsed first. An `Attic`
//! component marks its files as dead-at-head but contributes no path
//! component. Files not ending in `,v` are warned about and skipped.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::convert::{Converter, Error};
use crate::emit::Sink;
use crate::model::DirId;

const ATTIC: &str = "Attic";

/// Feeds every archive under the given roots to the converter.
///
/// A root may also be a single `,v` file. Directory roots contribute no
/// path component; their contents land at the top of the converted tree.
pub fn walk_roots<S: Sink>(cv: &mut Converter<S>, roots: &[PathBuf]) -> Result<(), Error> {
    for root in roots {
        let meta = fs::symlink_metadata(root).map_err(|source| Error::Walk {
            path: root.clone(),
            source,
        })?;
        if meta.is_dir() {
            let dir = cv.root_dir();
            walk_dir(cv, root, dir, false)?;
        } else if meta.is_file() {
            let dir = cv.root_dir();
            visit_file(cv, root, dir, false)?;
        }
        // Symlink roots are ignored, like everything else symlinked.
    }
    Ok(())
}

fn walk_dir<S: Sink>(
    cv: &mut Converter<S>,
    path: &Path,
    dir: DirId,
    in_attic: bool,
) -> Result<(), Error> {
    let read = fs::read_dir(path).map_err(|source| Error::Walk {
        path: path.to_owned(),
        source,
    })?;

    let mut entries: Vec<fs::DirEntry> = Vec::new();
    for entry in read {
        entries.push(entry.map_err(|source| Error::Walk {
            path: path.to_owned(),
            source,
        })?);
    }
    entries.sort_by(|a, b| attic_first(&a.file_name(), &b.file_name()));

    for entry in entries {
        let name = entry.file_name();
        let entry_path = entry.path();
        let kind = entry.file_type().map_err(|source| Error::Walk {
            path: entry_path.clone(),
            source,
        })?;

        if kind.is_symlink() {
            continue;
        }
        if kind.is_dir() {
            if in_attic {
                error!("Attic at {} has subdirectory", path.display());
            }
            if name == ATTIC {
                walk_dir(cv, &entry_path, dir, true)?;
            } else {
                let sub = cv.subdir(dir, name.as_encoded_bytes());
                walk_dir(cv, &entry_path, sub, in_attic)?;
            }
        } else if kind.is_file() {
            visit_file(cv, &entry_path, dir, in_attic)?;
        }
    }
    Ok(())
}

fn visit_file<S: Sink>(
    cv: &mut Converter<S>,
    path: &Path,
    dir: DirId,
    in_attic: bool,
) -> Result<(), Error> {
    let name = path.file_name().unwrap_or_default().as_encoded_bytes();
    let Some(stem) = name.strip_suffix(b",v") else {
        warn!("encountered non-RCS file {}", path.display());
        return Ok(());
    };

    let meta = fs::metadata(path).map_err(|source| Error::Walk {
        path: path.to_owned(),
        source,
    })?;
    let bytes = fs::read(path).map_err(|source| Error::Walk {
        path: path.to_owned(),
        source,
    })?;

    cv.add_archive(dir, stem, is_executable(&meta), in_attic, &bytes)?;
    Ok(())
}

/// Sorts `Attic` before every sibling, then by name bytes.
fn attic_first(a: &OsStr, b: &OsStr) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    if a == ATTIC {
        return if b == ATTIC {
            Ordering::Equal
        } else {
            Ordering::Less
        };
    }
    if b == ATTIC {
        return Ordering::Greater;
    }
    a.as_encoded_bytes().cmp(b.as_encoded_bytes())
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}
