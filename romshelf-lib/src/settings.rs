//! Application settings.
//!
//! The CLI and the workers read `~/.config/romshelf/settings.toml`. Every
//! field has a default, so a missing file (or a missing section) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::selection::SelectionPolicy;

/// Canonical path to the settings file: `~/.config/romshelf/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("romshelf").join("settings.toml")
}

/// Default data directory: `~/.local/share/romshelf` (platform equivalent).
pub fn default_data_dir() -> PathBuf {
    let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    data.join("romshelf")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file. Defaults to `<data_dir>/romshelf.db`.
    pub database_path: Option<PathBuf>,
    /// Root for managed files (stored catalogs). Defaults to [`default_data_dir`].
    pub data_dir: Option<PathBuf>,
    /// Superseded catalog files kept per platform by `datPrune`.
    pub dat_prune_keep: usize,
    pub worker: WorkerSettings,
    pub dat: DatSettings,
    pub scan: ScanSettings,
    pub selection: SelectionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            data_dir: None,
            dat_prune_keep: 3,
            worker: WorkerSettings::default(),
            dat: DatSettings::default(),
            scan: ScanSettings::default(),
            selection: SelectionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    /// Attempts before a retryable job is marked failed for good.
    pub max_attempts: u32,
    /// Retry delay is `backoff_base_secs * 2^(attempts - 1)`.
    pub backoff_base_secs: u64,
    /// Hard per-job limit. Also the lease length on a claimed job.
    pub safety_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval_ms: 500,
            max_attempts: 5,
            backoff_base_secs: 10,
            safety_timeout_secs: 1800,
        }
    }
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_secs(self.safety_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatSettings {
    /// Limit for one external archive tool invocation.
    pub archive_timeout_secs: u64,
    /// Limit for one catalog download.
    pub fetch_timeout_secs: u64,
    /// Entries per upsert transaction.
    pub import_batch_size: usize,
}

impl Default for DatSettings {
    fn default() -> Self {
        Self {
            archive_timeout_secs: 120,
            fetch_timeout_secs: 60,
            import_batch_size: 500,
        }
    }
}

impl DatSettings {
    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Glob patterns, relative to each library root, skipped by scans.
    pub ignore: Vec<String>,
}

impl Settings {
    /// Load settings from `path`, or from [`settings_path`] when `None`.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, SettingsError> {
        toml::from_str(contents).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Write settings to `path`, atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("romshelf.db"))
    }

    /// Directory holding the stored catalog files of one platform.
    pub fn dat_storage_dir(&self, platform_id: &str) -> PathBuf {
        self.data_dir().join("dats").join(platform_id)
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
