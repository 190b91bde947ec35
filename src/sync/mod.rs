//! Per-file sync: skip what is already archived, copy the rest.

pub mod macos;
pub mod strategy;

pub use macos::CreationTimeCopy;
pub use strategy::{PlainCopy, TimestampCopy};

use crate::heuristic::{
    self, Difference, FileIdentitySnapshot, FsMetadata, MetadataSource, Sameness, TimeSignal,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// One way of getting `src` to `dst`.
pub trait CopyStrategy {
    fn name(&self) -> &'static str;

    /// Timestamp this strategy reproduces on `dst`, and so the one the
    /// sameness check compares.
    fn time_signal(&self) -> TimeSignal;

    /// Copy `src` to `dst`. The parent of `dst` already exists, and
    /// `snapshot` is the source metadata read just before the copy.
    fn copy(&self, src: &Path, dst: &Path, snapshot: &FileIdentitySnapshot) -> Result<()>;
}

/// Copy strategy selectable from config or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CopyStrategyKind {
    Plain,
    PreserveTimestamps,
    PreserveCreationTime,
}

impl CopyStrategyKind {
    /// The most faithful strategy this platform supports.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            CopyStrategyKind::PreserveCreationTime
        } else {
            CopyStrategyKind::PreserveTimestamps
        }
    }

    pub fn build(self) -> Result<Box<dyn CopyStrategy>> {
        Ok(match self {
            CopyStrategyKind::Plain => Box::new(PlainCopy),
            CopyStrategyKind::PreserveTimestamps => Box::new(TimestampCopy),
            CopyStrategyKind::PreserveCreationTime => Box::new(CreationTimeCopy::new()?),
        })
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Destination already holds this file.
    Skipped,
    /// Copied, or would have been during a dry run. `reason` says why the
    /// destination did not count as the same file.
    Copied {
        bytes: u64,
        dry_run: bool,
        reason: Difference,
    },
    Failed(Error),
}

pub struct SyncEngine<M = FsMetadata> {
    strategy: Box<dyn CopyStrategy>,
    metadata: M,
}

impl SyncEngine<FsMetadata> {
    pub fn new(strategy: Box<dyn CopyStrategy>) -> Self {
        Self::with_metadata(strategy, FsMetadata)
    }
}

impl<M: MetadataSource> SyncEngine<M> {
    pub fn with_metadata(strategy: Box<dyn CopyStrategy>, metadata: M) -> Self {
        Self { strategy, metadata }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Sync one file. A dry run reads metadata but never writes.
    pub fn sync(&self, src: &Path, dst: &Path, dry_run: bool) -> SyncOutcome {
        match self.try_sync(src, dst, dry_run) {
            Ok(outcome) => outcome,
            Err(e) => SyncOutcome::Failed(e),
        }
    }

    fn try_sync(&self, src: &Path, dst: &Path, dry_run: bool) -> Result<SyncOutcome> {
        let (sameness, snapshot) =
            heuristic::is_same(&self.metadata, src, dst, self.strategy.time_signal())?;

        let difference = match sameness {
            Sameness::Same => {
                debug!("Already backed up: {}", dst.display());
                return Ok(SyncOutcome::Skipped);
            }
            Sameness::Different(difference) => difference,
        };

        if dry_run {
            debug!("Dry run, would copy to {} ({})", dst.display(), difference);
            return Ok(SyncOutcome::Copied {
                bytes: snapshot.size,
                dry_run: true,
                reason: difference,
            });
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreation {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        info!(
            "Copying {} -> {} ({}, {} bytes)",
            src.display(),
            dst.display(),
            difference,
            snapshot.size
        );
        self.strategy.copy(src, dst, &snapshot)?;

        Ok(SyncOutcome::Copied {
            bytes: snapshot.size,
            dry_run: false,
            reason: difference,
        })
    }
}
