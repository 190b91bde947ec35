//! Birth-time preserving copy using the macOS developer tools.
//!
//! `cp` and `touch -r` carry content, modification and access time.
//! Birth time is read back with `GetFileInfo -d` and written with
//! `SetFile -d`, both of which speak `MM/DD/YYYY HH:MM:SS` in local time.

use super::CopyStrategy;
use crate::command::{CommandRunner, ShellCommand, SystemCommandRunner};
use crate::heuristic::{FileIdentitySnapshot, TimeSignal};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

const STRATEGY_NAME: &str = "preserve-creation-time";
const FILE_INFO_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

pub struct CreationTimeCopy<R = SystemCommandRunner> {
    runner: R,
}

impl CreationTimeCopy<SystemCommandRunner> {
    pub fn new() -> Result<Self> {
        Self::with_runner(SystemCommandRunner)
    }
}

impl<R: CommandRunner> CreationTimeCopy<R> {
    /// Fails on any platform other than macOS, before a single file is copied.
    pub fn with_runner(runner: R) -> Result<Self> {
        Self::for_platform(std::env::consts::OS, runner)
    }

    pub(crate) fn for_platform(os: &str, runner: R) -> Result<Self> {
        if os != "macos" {
            return Err(Error::UnsupportedPlatform {
                strategy: STRATEGY_NAME,
                platform: os.to_string(),
            });
        }
        Ok(Self { runner })
    }

    /// Any failure here, including `cp` not starting, reveals the source.
    fn copy_content(&self, src: &Path, dst: &Path) -> Result<()> {
        let reason = match self.runner.run(&ShellCommand::new("cp").arg(src).arg(dst)) {
            Ok(output) if output.success => return Ok(()),
            Ok(output) => format!("cp failed ({})", output.failure_reason()),
            Err(e) => format!("cp could not run: {}", e),
        };

        let reveal = ShellCommand::new("open").arg("-R").arg(src);
        match self.runner.run(&reveal) {
            Ok(o) if o.success => {}
            Ok(o) => warn!("Could not reveal {}: {}", src.display(), o.status),
            Err(e) => warn!("Could not reveal {}: {}", src.display(), e),
        }

        Err(Error::ContentCopy {
            src: src.to_path_buf(),
            reason,
        })
    }

    fn run_metadata_step(&self, command: ShellCommand, dst: &Path) -> Result<String> {
        let output = self.runner.run(&command)?;
        if !output.success {
            return Err(Error::MetadataCopy {
                dst: dst.to_path_buf(),
                reason: format!("`{}` failed ({})", command, output.failure_reason()),
            });
        }
        Ok(output.stdout)
    }
}

impl<R: CommandRunner> CopyStrategy for CreationTimeCopy<R> {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn time_signal(&self) -> TimeSignal {
        TimeSignal::CreationTime
    }

    fn copy(&self, src: &Path, dst: &Path, snapshot: &FileIdentitySnapshot) -> Result<()> {
        self.copy_content(src, dst)?;

        self.run_metadata_step(ShellCommand::new("touch").arg("-r").arg(src).arg(dst), dst)?;

        let from_tool = self.run_metadata_step(ShellCommand::new("GetFileInfo").arg("-d").arg(src), dst)?;
        let from_tool = from_tool.trim_end_matches(['\n', '\r']).to_string();

        // Nothing is written unless the tool and `stat` agree.
        let from_stat = snapshot
            .created
            .map(format_file_info_time)
            .unwrap_or_default();
        if from_tool != from_stat {
            return Err(Error::TimestampVerification {
                src: src.to_path_buf(),
                from_tool,
                from_stat,
            });
        }

        debug!("Setting birth time of {} to {}", dst.display(), from_tool);
        self.run_metadata_step(ShellCommand::new("SetFile").arg("-d").arg(&from_tool).arg(dst), dst)?;

        Ok(())
    }
}

/// Format a birth time the way `GetFileInfo -d` prints it.
pub fn format_file_info_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(FILE_INFO_FORMAT).to_string()
}
