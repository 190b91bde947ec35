//! Backup configuration, read from a JSON file.

use crate::classify::{FileClassification, FolderNames};
use crate::planner::FolderMapping;
use crate::sync::CopyStrategyKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub destination_root: String,
    #[serde(default)]
    pub sd_card_mount_point: String,
    pub sd_card_names: Option<Vec<String>>,
    pub folder_mapping: Option<Vec<FolderMapping>>,
    /// Program and arguments to run once before backing up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_to_run_before: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_strategy: Option<CopyStrategyKind>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub folder_names: HashMap<FileClassification, String>,
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Config {
    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::Configuration {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/sd-card-backup/config.json`, or the same under
    /// `~/.config` when the variable is unset.
    pub fn default_path() -> Result<PathBuf> {
        let config_home = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or_else(|| Error::Configuration {
                    reason: "Could not determine home directory".to_string(),
                })?
                .join(".config"),
        };

        Ok(config_home.join("sd-card-backup").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.destination_root.is_empty() {
            return Err(invalid("missing `destination_root`"));
        }
        if self.sd_card_mount_point.is_empty() {
            return Err(invalid("missing `sd_card_mount_point`"));
        }

        let names = self
            .sd_card_names
            .as_ref()
            .ok_or_else(|| invalid("missing `sd_card_names`"))?;
        if names.is_empty() {
            return Err(invalid("empty `sd_card_names`"));
        }
        if names.iter().any(String::is_empty) {
            return Err(invalid("contains empty card name"));
        }

        let mappings = self
            .folder_mapping
            .as_ref()
            .ok_or_else(|| invalid("missing `folder_mapping`"))?;
        if mappings.is_empty() {
            return Err(invalid("empty `folder_mapping`"));
        }
        for mapping in mappings {
            if mapping.source.is_empty() {
                return Err(invalid(format!(
                    "missing `source` in folder mapping: {:?}",
                    mapping
                )));
            }
            if mapping.destination.is_empty() {
                return Err(invalid(format!(
                    "missing `destination` in folder mapping: {:?}",
                    mapping
                )));
            }
        }

        for classification in FileClassification::BACKUP_ORDER {
            if let Some(name) = self.folder_names.get(&classification) {
                if !is_plain_folder_name(name) {
                    return Err(invalid(format!(
                        "invalid folder name for {:?}: {:?}",
                        classification, name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn destination_root(&self) -> PathBuf {
        PathBuf::from(&self.destination_root)
    }

    pub fn mount_point(&self) -> PathBuf {
        PathBuf::from(&self.sd_card_mount_point)
    }

    pub fn card_names(&self) -> &[String] {
        self.sd_card_names.as_deref().unwrap_or_default()
    }

    pub fn folder_mappings(&self) -> &[FolderMapping] {
        self.folder_mapping.as_deref().unwrap_or_default()
    }

    pub fn folder_name_table(&self) -> FolderNames {
        FolderNames::with_overrides(&self.folder_names)
    }

    pub fn strategy(&self) -> CopyStrategyKind {
        self.copy_strategy
            .unwrap_or_else(CopyStrategyKind::platform_default)
    }
}

/// One path component that stays where it is put.
fn is_plain_folder_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::Configuration {
        reason: reason.into(),
    }
}
