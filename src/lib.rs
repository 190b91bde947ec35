//! # sd-card-backup
//!
//! Copies media off SD cards into an archive laid out as
//!
//! ```text
//! [archive]/[Images|Videos|Raw Videos|Audio|Unsorted]/[YYYY]/[YYYY-MM-DD]/[card]/[folder]/...
//! ```
//!
//! Files already present at their destination (same name, size and birth
//! time) are skipped, so running a backup twice copies nothing the second
//! time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sd_card_backup::sync::{PlainCopy, SyncEngine, SyncOutcome};
//! use std::path::Path;
//!
//! let engine = SyncEngine::new(Box::new(PlainCopy));
//! let outcome = engine.sync(
//!     Path::new("/Volumes/HERA/DCIM/100CANON/IMG_0001.JPG"),
//!     Path::new("/archive/Images/2021/2021-03-04/HERA/DCIM/100CANON/IMG_0001.JPG"),
//!     false,
//! );
//! if let SyncOutcome::Failed(e) = outcome {
//!     eprintln!("{}", e);
//! }
//! ```

pub mod backup;
pub mod classify;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod logging;
pub mod planner;
pub mod sync;

// Re-export commonly used types
pub use backup::{Backup, BackupOptions, BackupSummary, ConsoleProgress, SyncProgress};
pub use classify::{classify_ext, classify_path, FileClassification, FolderNames};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use planner::{FolderMapping, SyncContext};
pub use sync::{CopyStrategy, CopyStrategyKind, SyncEngine, SyncOutcome};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
