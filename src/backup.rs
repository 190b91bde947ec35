//! Backing up every configured card, folder mapping by folder mapping.

use crate::classify::{classify_path, FileClassification, FolderNames};
use crate::command::{CommandRunner, ShellCommand};
use crate::config::Config;
use crate::heuristic::{Difference, FsMetadata, MetadataSource};
use crate::planner::{FolderMapping, SyncContext};
use crate::sync::{CopyStrategyKind, SyncEngine, SyncOutcome};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use tracing::{debug, info, span, warn, Level};
use walkdir::WalkDir;

const BYTES_IN_MEGABYTE: u64 = 1000 * 1000;

/// Run-wide switches, layered from the config file and command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupOptions {
    pub dry_run: bool,
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_copied: u64,
}

/// Receives one call per file plus run boundaries.
pub trait SyncProgress {
    fn on_start(&mut self, mount_point: &Path, destination_root: &Path, dry_run: bool);

    fn on_card_start(&mut self, card_name: &str);

    fn on_file_done(&mut self, src: &Path, dst: &Path, outcome: &SyncOutcome);

    fn on_complete(&mut self, summary: &BackupSummary);
}

/// Prints a line per file to stdout, failures to stderr.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    pub fn new() -> Self {
        Self
    }
}

impl SyncProgress for ConsoleProgress {
    fn on_start(&mut self, mount_point: &Path, destination_root: &Path, dry_run: bool) {
        println!("--------");
        println!("Backing up from:\n  {}", mount_point.display());
        println!("Backing up to:\n  {}", destination_root.display());
        if dry_run {
            println!("(dry run: nothing will be written)");
        }
        println!("--------");
    }

    fn on_card_start(&mut self, card_name: &str) {
        println!("[{}] Backing up SD card", card_name);
    }

    fn on_file_done(&mut self, src: &Path, dst: &Path, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Skipped => {
                println!("{} (skipping: already backed up)", src.display())
            }
            SyncOutcome::Copied {
                bytes,
                dry_run,
                reason,
            } => println!("{}", copied_line(src, dst, *bytes, *dry_run, reason)),
            SyncOutcome::Failed(e) => eprintln!("Error backing up {}: {}", src.display(), e),
        }
    }

    fn on_complete(&mut self, summary: &BackupSummary) {
        println!(
            "Backup complete: {} copied ({} MB), {} already backed up, {} failed",
            summary.copied,
            summary.bytes_copied / BYTES_IN_MEGABYTE,
            summary.skipped,
            summary.failed
        );
    }
}

fn copied_line(src: &Path, dst: &Path, bytes: u64, dry_run: bool, reason: &Difference) -> String {
    format!(
        "{}\n↪ {} ({} MB, {}){}",
        src.display(),
        dst.display(),
        bytes / BYTES_IN_MEGABYTE,
        reason,
        if dry_run { " [dry run]" } else { "" }
    )
}

/// Drives tree walking, planning and syncing across cards.
pub struct Backup<M = FsMetadata> {
    config: Config,
    options: BackupOptions,
    folder_names: FolderNames,
    engine: SyncEngine<M>,
}

impl Backup<FsMetadata> {
    /// Build the copy strategy up front, so an unsupported one fails
    /// before anything is read from a card.
    pub fn new(config: Config, strategy: CopyStrategyKind, options: BackupOptions) -> Result<Self> {
        let engine = SyncEngine::new(strategy.build()?);
        Ok(Self::with_engine(config, options, engine))
    }
}

impl<M: MetadataSource> Backup<M> {
    pub fn with_engine(config: Config, options: BackupOptions, engine: SyncEngine<M>) -> Self {
        let folder_names = config.folder_name_table();
        Self {
            config,
            options,
            folder_names,
            engine,
        }
    }

    /// Run `command_to_run_before`, unless this is a dry run.
    pub fn run_command_before(&self, runner: &dyn CommandRunner) -> Result<()> {
        let Some((program, args)) = self.config.command_to_run_before.split_first() else {
            return Ok(());
        };
        let command = ShellCommand::new(program.as_str()).args(args).inherit_stdout();

        if self.options.dry_run {
            println!("Skipping `command_to_run_before` due to dry run: {}", command);
            return Ok(());
        }

        println!("Running command: {}", command);
        let output = runner.run(&command)?;
        if !output.success {
            return Err(Error::Configuration {
                reason: format!(
                    "`command_to_run_before` failed ({}): {}",
                    output.failure_reason(),
                    command
                ),
            });
        }
        Ok(())
    }

    /// Back up every card in `sd_card_names`.
    pub fn backup_all_cards(&self, progress: &mut dyn SyncProgress) -> Result<BackupSummary> {
        let mount_point = self.config.mount_point();
        let destination_root = self.config.destination_root();

        if !folder_exists(&mount_point)? {
            return Err(Error::Configuration {
                reason: format!("SD card mount point does not exist: {}", mount_point.display()),
            });
        }
        if !folder_exists(&destination_root)? {
            return Err(Error::Configuration {
                reason: format!("destination folder does not exist: {}", destination_root.display()),
            });
        }

        info!(
            "Backing up {} -> {} using {}",
            mount_point.display(),
            destination_root.display(),
            self.engine.strategy_name()
        );
        progress.on_start(&mount_point, &destination_root, self.options.dry_run);

        let mut summary = BackupSummary::default();
        for card_name in self.config.card_names() {
            self.backup_card(card_name, progress, &mut summary)?;
        }

        progress.on_complete(&summary);
        Ok(summary)
    }

    /// Back up one card. An unmounted card is skipped.
    pub fn backup_card(
        &self,
        card_name: &str,
        progress: &mut dyn SyncProgress,
        summary: &mut BackupSummary,
    ) -> Result<()> {
        let mount_point = self.config.mount_point();
        let card_path = mount_point.join(card_name);
        if !folder_exists(&card_path)? {
            debug!("[{}] Skipping SD card (unmounted)", card_name);
            return Ok(());
        }

        let span = span!(Level::INFO, "backup_card", card = %card_name);
        let _enter = span.enter();
        progress.on_card_start(card_name);

        for classification in FileClassification::BACKUP_ORDER {
            for mapping in self.config.folder_mappings() {
                let context = self.context_for(&mount_point, card_name, mapping);
                if !folder_exists(&context.source_root)? {
                    continue;
                }
                self.backup_folder(&context, classification, progress, summary)?;
            }
        }

        Ok(())
    }

    fn context_for(&self, mount_point: &Path, card_name: &str, mapping: &FolderMapping) -> SyncContext {
        SyncContext::new(
            self.config.destination_root(),
            mount_point,
            card_name,
            mapping.clone(),
            self.folder_names.clone(),
        )
    }

    /// Sync every file of `classification` under the mapping's source root.
    fn backup_folder(
        &self,
        context: &SyncContext,
        classification: FileClassification,
        progress: &mut dyn SyncProgress,
        summary: &mut BackupSummary,
    ) -> Result<()> {
        debug!(
            "Walking {} for {:?} files",
            context.source_root.display(),
            classification
        );

        for entry in WalkDir::new(&context.source_root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_dir() || classify_path(entry.path()) != classification {
                continue;
            }

            let src = entry.path();
            let metadata = entry.metadata()?;
            let dst = context.plan(src, classification, capture_time(&metadata)?)?;

            let outcome = self.engine.sync(src, &dst, self.options.dry_run);
            progress.on_file_done(src, &dst, &outcome);
            self.record(src, outcome, summary)?;
        }

        Ok(())
    }

    fn record(&self, src: &Path, outcome: SyncOutcome, summary: &mut BackupSummary) -> Result<()> {
        match outcome {
            SyncOutcome::Skipped => summary.skipped += 1,
            SyncOutcome::Copied { bytes, .. } => {
                summary.copied += 1;
                summary.bytes_copied += bytes;
            }
            SyncOutcome::Failed(e) => {
                summary.failed += 1;
                if self.options.continue_on_error && e.is_per_file() {
                    warn!("Continuing after failure on {}: {}", src.display(), e);
                } else {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Birth time in local time; modification time where there is none.
fn capture_time(metadata: &fs::Metadata) -> Result<DateTime<Local>> {
    let time = match metadata.created() {
        Ok(created) => created,
        Err(_) => metadata.modified()?,
    };
    Ok(DateTime::<Local>::from(time))
}

fn folder_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::ScriptedRunner;
    use crate::command::CommandOutput;
    use crate::heuristic::{FileIdentitySnapshot, TimeSignal};
    use crate::sync::{CopyStrategy, PlainCopy, TimestampCopy};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Archive path a file would be planned to, using its own metadata.
    fn planned_destination(context: &SyncContext, src: &Path) -> Result<PathBuf> {
        let metadata = fs::metadata(src)?;
        context.plan(src, classify_path(src), capture_time(&metadata)?)
    }

    #[derive(Default)]
    struct RecordingProgress {
        cards: Vec<String>,
        files: Vec<(PathBuf, PathBuf, &'static str)>,
        reasons: Vec<Difference>,
        completed: Option<BackupSummary>,
    }

    impl SyncProgress for RecordingProgress {
        fn on_start(&mut self, _: &Path, _: &Path, _: bool) {}

        fn on_card_start(&mut self, card_name: &str) {
            self.cards.push(card_name.to_string());
        }

        fn on_file_done(&mut self, src: &Path, dst: &Path, outcome: &SyncOutcome) {
            let label = match outcome {
                SyncOutcome::Skipped => "skipped",
                SyncOutcome::Copied { reason, .. } => {
                    self.reasons.push(reason.clone());
                    "copied"
                }
                SyncOutcome::Failed(_) => "failed",
            };
            self.files.push((src.to_path_buf(), dst.to_path_buf(), label));
        }

        fn on_complete(&mut self, summary: &BackupSummary) {
            self.completed = Some(*summary);
        }
    }

    /// Refuses any file whose name starts with `BAD`.
    struct PickyCopy;

    impl CopyStrategy for PickyCopy {
        fn name(&self) -> &'static str {
            "picky"
        }

        fn time_signal(&self) -> TimeSignal {
            TimeSignal::SizeOnly
        }

        fn copy(&self, src: &Path, dst: &Path, snapshot: &FileIdentitySnapshot) -> Result<()> {
            let name = src.file_name().unwrap_or_default().to_string_lossy();
            if name.starts_with("BAD") {
                return Err(Error::ContentCopy {
                    src: src.to_path_buf(),
                    reason: "refused".to_string(),
                });
            }
            PlainCopy.copy(src, dst, snapshot)
        }
    }

    struct Fixture {
        temp_dir: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let temp_dir = TempDir::new()?;
            let volumes = temp_dir.path().join("Volumes");
            let archive = temp_dir.path().join("archive");
            fs::create_dir_all(&volumes)?;
            fs::create_dir_all(&archive)?;

            let config = Config {
                destination_root: archive.to_string_lossy().into_owned(),
                sd_card_mount_point: volumes.to_string_lossy().into_owned(),
                sd_card_names: Some(vec!["HERA".to_string(), "ZEUS".to_string()]),
                folder_mapping: Some(vec![
                    FolderMapping::new("DCIM", "DCIM"),
                    FolderMapping::new("PRIVATE/M4ROOT/CLIP", "CLIP"),
                ]),
                ..Config::default()
            };
            config.validate()?;

            Ok(Self { temp_dir, config })
        }

        fn card_file(&self, card: &str, relative: &str, contents: &[u8]) -> Result<PathBuf> {
            let path = self.temp_dir.path().join("Volumes").join(card).join(relative);
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(&path, contents)?;
            Ok(path)
        }

        fn archive(&self) -> PathBuf {
            self.temp_dir.path().join("archive")
        }

        fn context(&self, card: &str, mapping: FolderMapping) -> SyncContext {
            SyncContext::new(
                self.archive(),
                &self.temp_dir.path().join("Volumes"),
                card,
                mapping,
                FolderNames::default(),
            )
        }

        fn archived_files(&self) -> Vec<PathBuf> {
            WalkDir::new(self.archive())
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path().to_path_buf())
                .collect()
        }

        fn backup(&self, strategy: Box<dyn CopyStrategy>, options: BackupOptions) -> Backup {
            Backup::with_engine(self.config.clone(), options, SyncEngine::new(strategy))
        }
    }

    #[test]
    fn test_backup_all_cards() -> Result<()> {
        let fixture = Fixture::new()?;
        let image = fixture.card_file("HERA", "DCIM/100CANON/IMG_0001.JPG", b"jpeg")?;
        let clip = fixture.card_file("HERA", "PRIVATE/M4ROOT/CLIP/C0001.MP4", b"mp4 data")?;
        let other = fixture.card_file("HERA", "DCIM/100CANON/NOTES.TXT", b"hi")?;

        let backup = fixture.backup(Box::new(PlainCopy), BackupOptions::default());
        let mut progress = RecordingProgress::default();
        let summary = backup.backup_all_cards(&mut progress)?;

        assert_eq!(
            summary,
            BackupSummary {
                copied: 3,
                skipped: 0,
                failed: 0,
                bytes_copied: 14,
            }
        );
        // ZEUS is not mounted.
        assert_eq!(progress.cards, ["HERA"]);
        assert_eq!(progress.completed, Some(summary));

        let image_dst = planned_destination(&fixture.context("HERA", FolderMapping::new("DCIM", "DCIM")), &image)?;
        let clip_dst = planned_destination(
            &fixture.context("HERA", FolderMapping::new("PRIVATE/M4ROOT/CLIP", "CLIP")),
            &clip,
        )?;
        let other_dst = planned_destination(&fixture.context("HERA", FolderMapping::new("DCIM", "DCIM")), &other)?;

        assert!(image_dst.starts_with(fixture.archive().join("Images")));
        assert!(image_dst.ends_with("HERA/DCIM/100CANON/IMG_0001.JPG"));
        assert!(clip_dst.starts_with(fixture.archive().join("Videos")));
        assert!(clip_dst.ends_with("HERA/CLIP/C0001.MP4"));
        assert!(other_dst.starts_with(fixture.archive().join("Unsorted")));

        assert_eq!(fs::read(&image_dst)?, b"jpeg");
        assert_eq!(fs::read(&clip_dst)?, b"mp4 data");
        assert_eq!(fs::read(&other_dst)?, b"hi");
        Ok(())
    }

    #[test]
    fn test_second_run_copies_nothing() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture.card_file("HERA", "DCIM/100CANON/IMG_0001.JPG", b"jpeg")?;
        fixture.card_file("HERA", "PRIVATE/M4ROOT/CLIP/C0001.MP4", b"mp4 data")?;

        let backup = fixture.backup(Box::new(TimestampCopy), BackupOptions::default());
        let first = backup.backup_all_cards(&mut RecordingProgress::default())?;
        let second = backup.backup_all_cards(&mut RecordingProgress::default())?;

        assert_eq!(first.copied, 2);
        assert_eq!(
            second,
            BackupSummary {
                copied: 0,
                skipped: 2,
                failed: 0,
                bytes_copied: 0,
            }
        );
        Ok(())
    }

    #[test]
    fn test_progress_receives_copy_reason() -> Result<()> {
        let fixture = Fixture::new()?;
        let image = fixture.card_file("HERA", "DCIM/100CANON/IMG_0001.JPG", b"jpeg")?;
        let context = fixture.context("HERA", FolderMapping::new("DCIM", "DCIM"));
        let stale = planned_destination(&context, &image)?;
        fs::create_dir_all(stale.parent().unwrap())?;
        fs::write(&stale, b"jp")?;

        let backup = fixture.backup(Box::new(TimestampCopy), BackupOptions::default());
        let mut progress = RecordingProgress::default();
        backup.backup_all_cards(&mut progress)?;

        assert_eq!(progress.reasons, [Difference::Size { src: 4, dst: 2 }]);
        assert_eq!(fs::read(&stale)?, b"jpeg");
        Ok(())
    }

    #[test]
    fn test_copied_line_names_reason() {
        let line = copied_line(
            Path::new("/Volumes/HERA/DCIM/IMG_0001.JPG"),
            Path::new("/archive/Images/2021/2021-03-04/HERA/DCIM/IMG_0001.JPG"),
            3_500_000,
            false,
            &Difference::Size { src: 3_500_000, dst: 12 },
        );
        assert_eq!(
            line,
            "/Volumes/HERA/DCIM/IMG_0001.JPG\n\
             ↪ /archive/Images/2021/2021-03-04/HERA/DCIM/IMG_0001.JPG \
             (3 MB, file size differs: 3500000 src bytes vs. 12 dest bytes)"
        );
    }

    #[test]
    fn test_classification_order() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture.card_file("HERA", "DCIM/A_NOTES.TXT", b"1")?;
        fixture.card_file("HERA", "DCIM/B_VOICE.MP3", b"2")?;
        fixture.card_file("HERA", "DCIM/C_CLIP.MOV", b"3")?;
        fixture.card_file("HERA", "DCIM/D_IMG.JPG", b"4")?;

        let backup = fixture.backup(Box::new(PlainCopy), BackupOptions::default());
        let mut progress = RecordingProgress::default();
        backup.backup_all_cards(&mut progress)?;

        let names: Vec<String> = progress
            .files
            .iter()
            .map(|(src, _, _)| src.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["D_IMG.JPG", "C_CLIP.MOV", "B_VOICE.MP3", "A_NOTES.TXT"]);
        Ok(())
    }

    #[test]
    fn test_dry_run_writes_nothing() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture.card_file("HERA", "DCIM/100CANON/IMG_0001.JPG", b"jpeg")?;

        let options = BackupOptions {
            dry_run: true,
            ..BackupOptions::default()
        };
        let backup = fixture.backup(Box::new(PlainCopy), options);
        let mut progress = RecordingProgress::default();
        let summary = backup.backup_all_cards(&mut progress)?;

        assert_eq!(summary.copied, 1);
        assert!(fixture.archived_files().is_empty());
        assert_eq!(fs::read_dir(fixture.archive())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_missing_mount_point() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut config = fixture.config.clone();
        config.sd_card_mount_point = fixture
            .temp_dir
            .path()
            .join("NoSuchVolumes")
            .to_string_lossy()
            .into_owned();

        let backup = Backup::with_engine(config, BackupOptions::default(), SyncEngine::new(Box::new(PlainCopy)));
        let result = backup.backup_all_cards(&mut RecordingProgress::default());

        assert!(matches!(result, Err(Error::Configuration { reason }) if reason.starts_with("SD card mount point does not exist")));
        Ok(())
    }

    #[test]
    fn test_missing_destination_root() -> Result<()> {
        let fixture = Fixture::new()?;
        fs::remove_dir(fixture.archive())?;

        let backup = fixture.backup(Box::new(PlainCopy), BackupOptions::default());
        let result = backup.backup_all_cards(&mut RecordingProgress::default());

        assert!(matches!(result, Err(Error::Configuration { reason }) if reason.starts_with("destination folder does not exist")));
        Ok(())
    }

    #[test]
    fn test_copy_failure_stops_run() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture.card_file("HERA", "DCIM/BAD_0001.JPG", b"x")?;
        fixture.card_file("HERA", "DCIM/IMG_0002.JPG", b"y")?;

        let backup = fixture.backup(Box::new(PickyCopy), BackupOptions::default());
        let result = backup.backup_all_cards(&mut RecordingProgress::default());

        assert!(matches!(result, Err(Error::ContentCopy { .. })));
        assert!(fixture.archived_files().is_empty());
        Ok(())
    }

    #[test]
    fn test_continue_on_error() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture.card_file("HERA", "DCIM/BAD_0001.JPG", b"x")?;
        fixture.card_file("HERA", "DCIM/IMG_0002.JPG", b"y")?;

        let options = BackupOptions {
            continue_on_error: true,
            ..BackupOptions::default()
        };
        let backup = fixture.backup(Box::new(PickyCopy), options);
        let mut progress = RecordingProgress::default();
        let summary = backup.backup_all_cards(&mut progress)?;

        assert_eq!(summary.copied, 1);
        assert_eq!(summary.failed, 1);
        let labels: Vec<&str> = progress.files.iter().map(|(_, _, label)| *label).collect();
        assert_eq!(labels, ["failed", "copied"]);
        Ok(())
    }

    #[test]
    fn test_command_before_runs() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut config = fixture.config.clone();
        config.command_to_run_before = vec!["diskutil".to_string(), "mount".to_string(), "HERA".to_string()];

        let backup = Backup::with_engine(config, BackupOptions::default(), SyncEngine::new(Box::new(PlainCopy)));
        let runner = ScriptedRunner::default();
        backup.run_command_before(&runner)?;

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "diskutil mount HERA");
        Ok(())
    }

    #[test]
    fn test_command_before_skipped_on_dry_run() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut config = fixture.config.clone();
        config.command_to_run_before = vec!["diskutil".to_string()];

        let options = BackupOptions {
            dry_run: true,
            ..BackupOptions::default()
        };
        let backup = Backup::with_engine(config, options, SyncEngine::new(Box::new(PlainCopy)));
        let runner = ScriptedRunner::default();
        backup.run_command_before(&runner)?;

        assert!(runner.calls.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_command_before_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut config = fixture.config.clone();
        config.command_to_run_before = vec!["false".to_string()];

        let backup = Backup::with_engine(config, BackupOptions::default(), SyncEngine::new(Box::new(PlainCopy)));
        let runner = ScriptedRunner::new([CommandOutput::failed(1)]);

        assert!(matches!(
            backup.run_command_before(&runner),
            Err(Error::Configuration { .. })
        ));
        Ok(())
    }
}
