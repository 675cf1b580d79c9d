//! Configuration management for parcelforge.
//!
//! Settings resolve in order: built-in defaults, then an optional
//! `config.toml` in the data directory, then environment variables
//! (loaded from `.env` by the binary), then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "parcels.db";

/// Config filename looked up inside the data directory.
const CONFIG_FILENAME: &str = "config.toml";

/// Tuning knobs for the transform-and-load pipeline.
///
/// The error threshold and swap fraction are deliberately configuration,
/// not constants: the upstream system shipped them as magic numbers with
/// no stated rationale, so operators get to choose.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records per upsert batch.
    pub batch_size: usize,
    /// Upsert retries per batch before marking it failed.
    pub max_retries: u32,
    /// Counties processed concurrently.
    pub max_concurrent_counties: usize,
    /// Douglas-Peucker tolerance in degrees for the rendering geometry.
    pub simplification_tolerance: f64,
    /// Cumulative transform+load errors that abort a county run.
    pub error_threshold: usize,
    /// Staging must hold at least this fraction of production before a swap.
    pub swap_min_fraction: f64,
    /// Delay between batches in milliseconds (bounds write pressure).
    pub batch_delay_ms: u64,
    /// Vintage date stamped on imported records (ISO date). None = run date.
    pub data_vintage: Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_retries: 3,
            max_concurrent_counties: 3,
            simplification_tolerance: 0.0001,
            error_threshold: 100,
            swap_min_fraction: 0.5,
            batch_delay_ms: 100,
            data_vintage: None,
        }
    }
}

impl PipelineConfig {
    /// The vintage date to stamp on records: configured date or today.
    pub fn vintage(&self) -> NaiveDate {
        self.data_vintage
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/parcelforge/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parcelforge");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Directory holding one county's source files.
    pub fn county_source_dir(&self, fips_code: &str) -> PathBuf {
        self.data_dir.join("counties").join(fips_code)
    }

    /// Load settings, merging `config.toml` from the data directory when
    /// present. A malformed config file is an error; a missing one is not.
    pub fn load(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut settings = match data_dir {
            Some(dir) => Self::with_data_dir(dir),
            None => match std::env::var("PARCELFORGE_DATA_DIR") {
                Ok(dir) => Self::with_data_dir(PathBuf::from(dir)),
                Err(_) => Self::default(),
            },
        };

        let config_path = settings.data_dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            let loaded = Self::from_file(&config_path)?;
            settings.database_filename = loaded.database_filename;
            settings.pipeline = loaded.pipeline;
        }

        Ok(settings)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let settings = toml::from_str(&contents)?;
        Ok(settings)
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_concurrent_counties, 3);
        assert_eq!(config.error_threshold, 100);
        assert!((config.swap_min_fraction - 0.5).abs() < f64::EPSILON);
        assert!((config.simplification_tolerance - 0.0001).abs() < f64::EPSILON);
    }

    #[test]
    fn test_vintage_defaults_to_today() {
        let config = PipelineConfig::default();
        assert_eq!(config.vintage(), Utc::now().date_naive());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let toml_str = r#"
            database_filename = "other.db"

            [pipeline]
            batch_size = 250
            error_threshold = 10
            data_vintage = "2024-06-01"
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.database_filename, "other.db");
        assert_eq!(settings.pipeline.batch_size, 250);
        assert_eq!(settings.pipeline.error_threshold, 10);
        assert_eq!(
            settings.pipeline.vintage(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
        // Unspecified fields keep defaults
        assert_eq!(settings.pipeline.max_retries, 3);
    }
}
