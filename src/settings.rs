//! Scheduler configuration, optionally loaded from a TOML file.
//!
//! The settings file is optional — a missing file yields
//! `Settings::default()`. Unknown keys are silently ignored by serde,
//! though a warning is logged when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings file exceeds maximum allowed size.
    #[error("Settings file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Settings
// ============================================================================

/// Scheduler configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of worker tasks executing queued work concurrently.
    pub worker_count: usize,

    /// Shared capacity of the work queue across both task classes.
    /// Enqueue on a full queue discards the task.
    pub queue_capacity: usize,

    /// Feed auto-refresh interval in minutes. 0 = manual refresh only.
    pub update_interval_minutes: u64,

    /// Reading-list re-fetch interval in minutes. 0 = manual only.
    pub reading_list_interval_minutes: u64,

    /// Maximum number of member feeds adopted from a single list fetch.
    pub import_limit: usize,

    /// Global gate for user-initiated feed refreshes.
    pub allow_manual_feed_updates: bool,

    /// Global gate for user-initiated reading-list refreshes.
    pub allow_manual_list_updates: bool,

    /// Accept localhost and private-range URLs in reading-list entries.
    /// Off by default; intranet deployments and tests opt in.
    pub allow_private_networks: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_count: 5,
            queue_capacity: 5000,
            update_interval_minutes: 30,
            reading_list_interval_minutes: 1440,
            import_limit: 500,
            allow_manual_feed_updates: true,
            allow_manual_list_updates: true,
            allow_private_networks: false,
        }
    }
}

impl Settings {
    /// Maximum settings file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML → `Err(SettingsError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        // Check file size before reading to avoid slurping a corrupted
        // or runaway file into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(SettingsError::TooLarge(format!(
                    "Settings file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Settings file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Settings file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "worker_count",
                "queue_capacity",
                "update_interval_minutes",
                "reading_list_interval_minutes",
                "import_limit",
                "allow_manual_feed_updates",
                "allow_manual_list_updates",
                "allow_private_networks",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in settings file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            workers = settings.worker_count,
            capacity = settings.queue_capacity,
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Feed auto-refresh interval, or `None` when auto-refresh is off.
    pub fn feed_interval(&self) -> Option<chrono::Duration> {
        (self.update_interval_minutes > 0)
            .then(|| chrono::Duration::minutes(self.update_interval_minutes as i64))
    }

    /// Reading-list re-fetch interval, or `None` when auto-refresh is off.
    pub fn list_interval(&self) -> Option<chrono::Duration> {
        (self.reading_list_interval_minutes > 0)
            .then(|| chrono::Duration::minutes(self.reading_list_interval_minutes as i64))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.worker_count, 5);
        assert_eq!(settings.queue_capacity, 5000);
        assert_eq!(settings.update_interval_minutes, 30);
        assert_eq!(settings.reading_list_interval_minutes, 1440);
        assert_eq!(settings.import_limit, 500);
        assert!(settings.allow_manual_feed_updates);
        assert!(settings.allow_manual_list_updates);
        assert!(!settings.allow_private_networks);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/freshet_test_nonexistent_settings.toml");
        let settings = Settings::load(path).unwrap();
        assert_eq!(settings.worker_count, 5);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("freshet_settings_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, "").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.queue_capacity, 5000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_settings_use_defaults_for_missing() {
        let dir = std::env::temp_dir().join("freshet_settings_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, "worker_count = 2\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.worker_count, 2);
        assert_eq!(settings.queue_capacity, 5000); // default
        assert!(settings.allow_manual_feed_updates); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_settings() {
        let dir = std::env::temp_dir().join("freshet_settings_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");

        let content = r#"
worker_count = 8
queue_capacity = 100
update_interval_minutes = 15
reading_list_interval_minutes = 60
import_limit = 25
allow_manual_feed_updates = false
allow_manual_list_updates = false
allow_private_networks = true
"#;
        std::fs::write(&path, content).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.worker_count, 8);
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings.update_interval_minutes, 15);
        assert_eq!(settings.reading_list_interval_minutes, 60);
        assert_eq!(settings.import_limit, 25);
        assert!(!settings.allow_manual_feed_updates);
        assert!(!settings.allow_manual_list_updates);
        assert!(settings.allow_private_networks);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("freshet_settings_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Settings::load(&path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("freshet_settings_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, "worker_count = 3\ntotally_fake_key = true\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.worker_count, 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("freshet_settings_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        // worker_count should be an integer, not a string
        std::fs::write(&path, "worker_count = \"five\"\n").unwrap();

        let result = Settings::load(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("freshet_settings_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");

        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let result = Settings::load(&path);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), SettingsError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_interval_means_manual_only() {
        let mut settings = Settings::default();
        settings.update_interval_minutes = 0;
        settings.reading_list_interval_minutes = 0;
        assert!(settings.feed_interval().is_none());
        assert!(settings.list_interval().is_none());
    }

    #[test]
    fn test_interval_accessors() {
        let settings = Settings::default();
        assert_eq!(settings.feed_interval(), Some(chrono::Duration::minutes(30)));
        assert_eq!(
            settings.list_interval(),
            Some(chrono::Duration::minutes(1440))
        );
    }
}
