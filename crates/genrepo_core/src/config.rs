//! Store and logging configuration.
//!
//! # Responsibility
//! - Describe how sessions open their SQLite connection.
//! - Describe where and how the file logger writes.
//!
//! # Invariants
//! - Every field has a default, so partial documents deserialize.
//! - `path = None` means an in-memory database private to each connection.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOG_FILE_BASENAME: &str = "genrepo";
const DEFAULT_MAX_LOG_FILE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_LOG_FILES: usize = 5;

/// SQLite journal mode applied when a connection opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Leave SQLite's default (rollback journal) untouched.
    #[default]
    Default,
    /// Write-ahead logging; readers do not block the writer.
    Wal,
}

/// Connection settings shared by every session of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a connection waits on a locked database.
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            journal_mode: JournalMode::Default,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Label used in log lines; never includes the file path.
    pub fn mode_label(&self) -> &'static str {
        if self.path.is_some() {
            "file"
        } else {
            "memory"
        }
    }
}

/// File logger settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rotated log files.
    pub directory: PathBuf,
    pub file_basename: String,
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::new(),
            file_basename: DEFAULT_LOG_FILE_BASENAME.to_string(),
            max_file_bytes: DEFAULT_MAX_LOG_FILE_BYTES,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

impl LogSettings {
    pub fn new(level: impl Into<String>, directory: impl AsRef<Path>) -> Self {
        Self {
            level: level.into(),
            directory: directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JournalMode, LogSettings, StoreConfig};

    #[test]
    fn defaults_open_private_memory_store_with_foreign_keys() {
        let config = StoreConfig::default();
        assert_eq!(config.path, None);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert!(config.foreign_keys);
        assert_eq!(config.journal_mode, JournalMode::Default);
        assert_eq!(config.mode_label(), "memory");
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = StoreConfig::file("/tmp/store.db")
            .busy_timeout_ms(250)
            .foreign_keys(false)
            .journal_mode(JournalMode::Wal);

        assert_eq!(config.mode_label(), "file");
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.foreign_keys);
        assert_eq!(config.journal_mode, JournalMode::Wal);
    }

    #[test]
    fn log_settings_keep_rotation_defaults() {
        let settings = LogSettings::new("debug", "/var/log/genrepo");
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.file_basename, "genrepo");
        assert_eq!(settings.max_files, 5);
        assert_eq!(settings.max_file_bytes, 10 * 1024 * 1024);
    }
}
