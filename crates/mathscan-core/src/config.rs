//! Pipeline configuration.
//!
//! Settings are read from a JSON file; every field is optional and falls
//! back to its default. The default location is
//! `<config dir>/mathscan/config.json` (for example
//! `~/.config/mathscan/config.json` on Linux).
//!
//! ```
//! use mathscan_core::config::{Config, LeftRightMode};
//!
//! let config: Config = serde_json::from_str(r#"{ "heuristic_brackets": false }"#).unwrap();
//! assert!(!config.heuristic_brackets);
//! assert!(config.normalize);
//! assert_eq!(config.left_right, LeftRightMode::Commands);
//! ```

pub use crate::error::ConfigError;
use mathscan_syntax::ScanOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::normalize::LeftRightMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trace every scanned segment at debug level.
    pub debug: bool,
    /// Promote bare `[...]`/`(...)` spans that look like math.
    pub heuristic_brackets: bool,
    /// Normalize expressions before rendering.
    pub normalize: bool,
    /// How `\left`/`\right` pairs are rewritten during normalization.
    pub left_right: LeftRightMode,
    /// Text units processed per cooperative batch.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            heuristic_brackets: true,
            normalize: true,
            left_right: LeftRightMode::default(),
            batch_size: 64,
        }
    }
}

impl Config {
    /// Returns the default config file path: `<config dir>/mathscan/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mathscan").join("config.json"))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` (or the default location), falling back to defaults if
    /// the file is missing or malformed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        match Self::load_from_path(&path) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            heuristic_brackets: self.heuristic_brackets,
            ..ScanOptions::default()
        }
    }

    /// Batch size clamped to at least one unit.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}
