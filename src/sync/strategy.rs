//! Portable copy strategies.

use super::CopyStrategy;
use crate::heuristic::{FileIdentitySnapshot, TimeSignal};
use crate::{Error, Result};
use filetime::FileTime;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Copies bytes and permissions only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCopy;

impl CopyStrategy for PlainCopy {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn time_signal(&self) -> TimeSignal {
        TimeSignal::SizeOnly
    }

    fn copy(&self, src: &Path, dst: &Path, _snapshot: &FileIdentitySnapshot) -> Result<()> {
        copy_file_atomic(src, dst).map_err(|e| Error::ContentCopy {
            src: src.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Copies bytes, then access and modification times. Birth time is left
/// to whatever the filesystem assigns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCopy;

impl CopyStrategy for TimestampCopy {
    fn name(&self) -> &'static str {
        "preserve-timestamps"
    }

    fn time_signal(&self) -> TimeSignal {
        TimeSignal::ModificationTime
    }

    fn copy(&self, src: &Path, dst: &Path, snapshot: &FileIdentitySnapshot) -> Result<()> {
        PlainCopy.copy(src, dst, snapshot)?;

        let atime = FileTime::from_system_time(snapshot.accessed);
        let mtime = FileTime::from_system_time(snapshot.modified);
        filetime::set_file_times(dst, atime, mtime).map_err(|e| Error::MetadataCopy {
            dst: dst.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Write `src` into a temporary file next to `dst`, then rename it into
/// place. A failed copy leaves no partial destination behind.
pub(crate) fn copy_file_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    let parent = dst
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;

    let mut input = File::open(src)?;
    let permissions = input.metadata()?.permissions();

    let mut tmp = NamedTempFile::new_in(parent)?;
    io::copy(&mut input, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(dst).map_err(|e| e.error)?;

    Ok(())
}
