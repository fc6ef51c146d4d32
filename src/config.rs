//! Application configuration.
//!
//! Loaded from `config.json` at startup and passed explicitly to whatever
//! needs it. Every field has a default, so a partial file only overrides
//! what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::leaderboard::LeaderboardSettings;
use crate::ocr::engine::DEFAULT_PAGE_SEGMENTATION_MODE;
use crate::parse::DEFAULT_VOCABULARY;
use crate::pose::DEFAULT_CONFIDENCE_CUTOFF;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Row association and column geometry for the leaderboard
    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
    /// Minimum match fraction for a pose to be reported
    #[serde(default = "default_pose_confidence_cutoff")]
    pub pose_confidence_cutoff: f32,
    /// Number of frame worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Frames allowed to wait for a worker before producers block
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Tesseract `--psm` value
    #[serde(default = "default_page_segmentation_mode")]
    pub page_segmentation_mode: u8,
    /// Labels recognized in free-text fields
    #[serde(default = "default_free_text_vocabulary")]
    pub free_text_vocabulary: Vec<String>,
    /// Directory searched for `WxH*.json` region catalogs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_dir: Option<PathBuf>,
    /// Pose calibration merged over the built-in table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_file: Option<PathBuf>,
}

fn default_pose_confidence_cutoff() -> f32 {
    DEFAULT_CONFIDENCE_CUTOFF
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_queue_capacity() -> usize {
    8
}

fn default_page_segmentation_mode() -> u8 {
    DEFAULT_PAGE_SEGMENTATION_MODE
}

fn default_free_text_vocabulary() -> Vec<String> {
    DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            leaderboard: LeaderboardSettings::default(),
            pose_confidence_cutoff: default_pose_confidence_cutoff(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            page_segmentation_mode: default_page_segmentation_mode(),
            free_text_vocabulary: default_free_text_vocabulary(),
            catalog_dir: None,
            calibration_file: None,
        }
    }
}

/// Returns `<exe_dir>/config.json`.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path` or returns defaults.
///
/// A missing or malformed file is logged and never fatal.
pub fn load_config(path: &Path) -> AppConfig {
    info!("Looking for config at: {}", path.display());

    if !path.exists() {
        info!("{} not found. Using default config.", path.display());
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_named_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"pose_confidence_cutoff": 0.7, "leaderboard": {"max_row_gap": 45.0}}"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.pose_confidence_cutoff, 0.7);
        assert_eq!(config.leaderboard.max_row_gap, 45.0);
        assert_eq!(config.leaderboard.min_row_gap, 10.0);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.page_segmentation_mode, 7);
        assert_eq!(config.free_text_vocabulary.len(), DEFAULT_VOCABULARY.len());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), AppConfig::default());
    }

    #[test]
    fn test_workers_default_is_positive() {
        assert!(AppConfig::default().workers >= 1);
    }
}
