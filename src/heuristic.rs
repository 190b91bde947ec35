//! Cheap "is this file already backed up" check.
//!
//! Two files are considered the same when their base names and byte
//! sizes match, and so does the timestamp the copy strategy carries over
//! (see [`TimeSignal`]), compared to the second. File contents are never
//! read, so a same-size file with the same timestamp but different bytes
//! is reported as `Same`. That false positive is accepted in exchange for
//! not reading every file on every run.

use crate::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Filesystem facts used to compare a source with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentitySnapshot {
    pub name: OsString,
    pub size: u64,
    /// Birth time, if the platform and filesystem record one.
    pub created: Option<SystemTime>,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl FileIdentitySnapshot {
    /// Birth time truncated to whole seconds since the epoch.
    pub fn created_secs(&self) -> Option<i64> {
        self.created.map(unix_secs)
    }

    /// Modification time truncated to whole seconds since the epoch.
    pub fn modified_secs(&self) -> i64 {
        unix_secs(self.modified)
    }

    /// Best available capture time: birth time, else modification time.
    pub fn capture_time(&self) -> SystemTime {
        self.created.unwrap_or(self.modified)
    }
}

fn unix_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs_f64().ceil() as i64),
    }
}

/// Where snapshots come from. `FsMetadata` in production.
pub trait MetadataSource {
    fn snapshot(&self, path: &Path) -> io::Result<FileIdentitySnapshot>;
}

/// Reads snapshots with `stat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMetadata;

impl MetadataSource for FsMetadata {
    fn snapshot(&self, path: &Path) -> io::Result<FileIdentitySnapshot> {
        let metadata = fs::metadata(path)?;
        let created = match metadata.created() {
            Ok(created) => Some(created),
            Err(e) => {
                debug!("No birth time for {}: {}", path.display(), e);
                None
            }
        };

        Ok(FileIdentitySnapshot {
            name: path.file_name().map(OsString::from).unwrap_or_default(),
            size: metadata.len(),
            created,
            modified: metadata.modified()?,
            accessed: metadata.accessed()?,
        })
    }
}

/// Timestamp compared after size. It must be one the copy strategy
/// reproduces on the destination, otherwise a copied file never
/// compares equal to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSignal {
    /// Birth time.
    CreationTime,
    ModificationTime,
    /// No timestamp survives the copy; size alone decides.
    SizeOnly,
}

/// Why a destination does not count as the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
    Missing,
    Size { src: u64, dst: u64 },
    CreationTime { src: Option<i64>, dst: Option<i64> },
    ModificationTime { src: i64, dst: i64 },
}

impl std::fmt::Display for Difference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difference::Missing => write!(f, "not backed up yet"),
            Difference::Size { src, dst } => {
                write!(f, "file size differs: {} src bytes vs. {} dest bytes", src, dst)
            }
            Difference::CreationTime { src, dst } => write!(
                f,
                "birth time differs: {} src vs. {} dest",
                fmt_secs(*src),
                fmt_secs(*dst)
            ),
            Difference::ModificationTime { src, dst } => write!(
                f,
                "modification time differs: {} src vs. {} dest",
                src, dst
            ),
        }
    }
}

fn fmt_secs(secs: Option<i64>) -> String {
    secs.map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sameness {
    Same,
    Different(Difference),
}

impl Sameness {
    pub fn is_same(&self) -> bool {
        matches!(self, Sameness::Same)
    }
}

/// Compare two snapshots: size first, then `signal`.
pub fn compare(
    src: &FileIdentitySnapshot,
    dst: &FileIdentitySnapshot,
    signal: TimeSignal,
) -> Sameness {
    if src.size != dst.size {
        return Sameness::Different(Difference::Size {
            src: src.size,
            dst: dst.size,
        });
    }

    match signal {
        TimeSignal::CreationTime => {
            let (src_created, dst_created) = (src.created_secs(), dst.created_secs());
            if src_created != dst_created {
                return Sameness::Different(Difference::CreationTime {
                    src: src_created,
                    dst: dst_created,
                });
            }
        }
        TimeSignal::ModificationTime => {
            let (src_modified, dst_modified) = (src.modified_secs(), dst.modified_secs());
            if src_modified != dst_modified {
                return Sameness::Different(Difference::ModificationTime {
                    src: src_modified,
                    dst: dst_modified,
                });
            }
        }
        TimeSignal::SizeOnly => {}
    }

    Sameness::Same
}

/// Decide whether `dst` already holds `src`.
///
/// The source snapshot is always returned on success so callers can
/// report sizes and reuse the birth time. A missing destination is
/// `Different`, not an error.
pub fn is_same<M: MetadataSource + ?Sized>(
    metadata: &M,
    src: &Path,
    dst: &Path,
    signal: TimeSignal,
) -> Result<(Sameness, FileIdentitySnapshot)> {
    if src.file_name() != dst.file_name() {
        return Err(Error::HeuristicMismatch {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    let src_snapshot = metadata.snapshot(src).map_err(|source| Error::Heuristic {
        path: src.to_path_buf(),
        source,
    })?;

    let dst_snapshot = match metadata.snapshot(dst) {
        Ok(snapshot) => snapshot,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok((Sameness::Different(Difference::Missing), src_snapshot));
        }
        Err(source) => {
            return Err(Error::Heuristic {
                path: dst.to_path_buf(),
                source,
            })
        }
    };

    let sameness = compare(&src_snapshot, &dst_snapshot, signal);
    if let Sameness::Different(ref difference) = sameness {
        debug!("{}: {}", dst.display(), difference);
    }

    Ok((sameness, src_snapshot))
}
