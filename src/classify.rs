//! File classification by extension.
//!
//! Classification is deliberately conservative: only extensions we have
//! seen come off camera and recorder cards are listed, everything else
//! ends up in `Unsorted`.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileClassification {
    Image,
    Video,
    RawVideo,
    Audio,
    Unclassified,
}

impl FileClassification {
    /// Order in which a card is backed up: pictures first, leftovers last.
    pub const BACKUP_ORDER: [FileClassification; 5] = [
        FileClassification::Image,
        FileClassification::Video,
        FileClassification::RawVideo,
        FileClassification::Audio,
        FileClassification::Unclassified,
    ];
}

static IMAGE_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "arw", "bmp", "cr2", "cr3", "dng", "gif", "heic", "jpeg", "jpg", "nef", "orf", "png",
        "raf", "raw", "rw2", "tif", "tiff",
    ]
    .into_iter()
    .collect()
});

static VIDEO_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "3gp", "avi", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "mts", "webm",
    ]
    .into_iter()
    .collect()
});

static RAW_VIDEO_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["ari", "braw", "crm", "mxf", "r3d"].into_iter().collect()
});

static AUDIO_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["aac", "aif", "aiff", "flac", "m4a", "mp3", "ogg", "wav"]
        .into_iter()
        .collect()
});

/// Classify an extension, with or without its leading period.
pub fn classify_ext(ext: &str) -> FileClassification {
    let ext = ext.strip_prefix('.').unwrap_or(ext).to_lowercase();
    if ext.is_empty() {
        return FileClassification::Unclassified;
    }

    let tables: [(&Lazy<HashSet<&'static str>>, FileClassification); 4] = [
        (&IMAGE_EXTENSIONS, FileClassification::Image),
        (&VIDEO_EXTENSIONS, FileClassification::Video),
        (&RAW_VIDEO_EXTENSIONS, FileClassification::RawVideo),
        (&AUDIO_EXTENSIONS, FileClassification::Audio),
    ];

    tables
        .iter()
        .find(|(set, _)| set.contains(ext.as_str()))
        .map(|(_, classification)| *classification)
        .unwrap_or(FileClassification::Unclassified)
}

pub fn classify_path<P: AsRef<Path>>(path: P) -> FileClassification {
    match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => classify_ext(ext),
        None => FileClassification::Unclassified,
    }
}

/// Display folder for each classification inside the archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNames {
    names: HashMap<FileClassification, String>,
}

impl FolderNames {
    /// Build a table from exactly the given entries, without defaults.
    pub fn from_map(names: HashMap<FileClassification, String>) -> Self {
        Self { names }
    }

    /// Layer overrides on top of the default names.
    pub fn with_overrides(overrides: &HashMap<FileClassification, String>) -> Self {
        let mut table = Self::default();
        for (classification, name) in overrides {
            table.names.insert(*classification, name.clone());
        }
        table
    }

    pub fn folder_for(&self, classification: FileClassification) -> Result<&str> {
        self.names
            .get(&classification)
            .map(String::as_str)
            .ok_or(Error::UnknownClassification(classification))
    }
}

impl Default for FolderNames {
    fn default() -> Self {
        let names = [
            (FileClassification::Image, "Images"),
            (FileClassification::Video, "Videos"),
            (FileClassification::RawVideo, "Raw Videos"),
            (FileClassification::Audio, "Audio"),
            (FileClassification::Unclassified, "Unsorted"),
        ]
        .into_iter()
        .map(|(c, name)| (c, name.to_string()))
        .collect();

        Self { names }
    }
}
