//! Destination path planning.
//!
//! A file at
//!
//! ```text
//! [mount point]/[card]/[mapping.source]/[relative path]
//! ```
//!
//! is archived at
//!
//! ```text
//! [archive root]/[classification]/[YYYY]/[YYYY-MM-DD]/[card]/[mapping.destination]/[relative path]
//! ```

use crate::classify::{FileClassification, FolderNames};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Relationship between a directory on the card and one in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMapping {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
}

impl FolderMapping {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Everything needed to plan destinations for one (card, mapping) walk.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub archive_root: PathBuf,
    pub card_name: String,
    pub mapping: FolderMapping,
    /// Absolute root of `mapping.source` on the mounted card.
    pub source_root: PathBuf,
    pub folder_names: FolderNames,
}

impl SyncContext {
    pub fn new(
        archive_root: impl Into<PathBuf>,
        mount_point: &Path,
        card_name: impl Into<String>,
        mapping: FolderMapping,
        folder_names: FolderNames,
    ) -> Self {
        let card_name = card_name.into();
        let source_root = mount_point.join(&card_name).join(&mapping.source);
        Self {
            archive_root: archive_root.into(),
            card_name,
            mapping,
            source_root,
            folder_names,
        }
    }

    /// Derive the archive path for `source_path`.
    pub fn plan(
        &self,
        source_path: &Path,
        classification: FileClassification,
        capture_time: DateTime<Local>,
    ) -> Result<PathBuf> {
        let classification_folder = self.folder_names.folder_for(classification)?;

        let relative_path =
            source_path
                .strip_prefix(&self.source_root)
                .map_err(|_| Error::PathComputation {
                    path: source_path.to_path_buf(),
                    root: self.source_root.clone(),
                })?;
        if relative_path.as_os_str().is_empty() {
            return Err(Error::PathComputation {
                path: source_path.to_path_buf(),
                root: self.source_root.clone(),
            });
        }

        let (year, date) = date_folder_names(capture_time);

        Ok(self
            .archive_root
            .join(classification_folder)
            .join(year)
            .join(date)
            .join(&self.card_name)
            .join(&self.mapping.destination)
            .join(relative_path))
    }
}

/// Year and `YYYY-MM-DD` folder names for a capture time.
pub fn date_folder_names(capture_time: DateTime<Local>) -> (String, String) {
    (
        capture_time.format("%Y").to_string(),
        capture_time.format("%Y-%m-%d").to_string(),
    )
}
