use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::similarity::DEFAULT_BATCH_SIZE;

/// Application configuration loaded from the TOML config file.
/// Every field has a default, so the file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset CSV to load when the CLI gets no `--dataset` flag.
    pub dataset: Option<PathBuf>,
    /// Rows scored per batch during ranking.
    pub batch_size: usize,
    /// Default number of search results.
    pub default_limit: usize,
    /// Default number of recommendations.
    pub default_recommendations: usize,
    /// Default playlist length, seed included.
    pub default_playlist_length: usize,
    /// Default playlist diversity, 0.0 to 1.0.
    pub default_diversity: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            batch_size: DEFAULT_BATCH_SIZE,
            default_limit: 10,
            default_recommendations: 5,
            default_playlist_length: 10,
            default_diversity: 0.5,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/soundalike/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => {
                        match toml::from_str::<AppConfig>(&contents) {
                            Ok(config) => {
                                log::info!("Loaded config from {}", path.display());
                                config
                            }
                            Err(e) => {
                                log::warn!(
                                    "Failed to parse {}: {}. Using defaults.",
                                    path.display(),
                                    e
                                );
                                Self::default()
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to read {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                }
            }
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.dataset.is_none());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.default_playlist_length, 10);
        assert_eq!(config.default_diversity, 0.5);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: AppConfig =
            toml::from_str("batch_size = 250\ndataset = \"/tmp/songs.csv\"").unwrap();
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.dataset, Some(PathBuf::from("/tmp/songs.csv")));
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.default_recommendations, 5);
    }
}
