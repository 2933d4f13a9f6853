//! Configuration file support.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/wrinkle-scan/config.toml` (lowest priority)
//! - Project-local: `.wrinkle-scan.toml` (searched up the directory tree)
//! - CLI flags and `PORT` (highest priority, applied in `resolve`)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::cli::{AnalysisMode, Cli};

/// Hardcoded fallback values.
mod defaults {
    pub const PORT: u16 = 8080;
    pub const CANNY_LOW: f32 = 50.0;
    pub const CANNY_HIGH: f32 = 150.0;
    pub const MIN_FACE_CONFIDENCE: f32 = 0.75;
    pub const DATA_DIR: &str = ".";
}

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server options.
    pub server: ServerConfig,
    /// Scoring pipeline options.
    pub scoring: ScoringConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Artifact storage settings.
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port.
    pub port: Option<u16>,
    /// Analysis mode: "single" or "regions".
    pub mode: Option<String>,
}

/// Scoring pipeline configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Canny low gradient threshold.
    pub canny_low: Option<f32>,
    /// Canny high gradient threshold.
    pub canny_high: Option<f32>,
    /// Minimum face detection confidence (0.0-1.0).
    pub min_face_confidence: Option<f32>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Artifact storage configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for uploads and intermediate artifacts.
    pub data_dir: Option<PathBuf>,
}

/// Fully resolved settings after layering defaults, config, and CLI.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Listening port.
    pub port: u16,
    /// Analysis mode.
    pub mode: AnalysisMode,
    /// Artifact data root.
    pub data_dir: PathBuf,
    /// Models directory override, if any.
    pub models_dir: Option<PathBuf>,
    /// Canny low gradient threshold.
    pub canny_low: f32,
    /// Canny high gradient threshold.
    pub canny_high: f32,
    /// Minimum face detection confidence.
    pub min_face_confidence: f32,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest): XDG config, then project-local.
    /// Missing files are silently ignored; invalid values are logged.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        if let Some(port) = self.server.port {
            if port == 0 {
                return Err("server.port must be nonzero".to_string());
            }
        }
        if let Some(ref mode) = self.server.mode {
            if AnalysisMode::from_config_name(mode).is_none() {
                return Err(format!(
                    "server.mode must be 'single' or 'regions', got '{mode}'"
                ));
            }
        }
        if let Some(low) = self.scoring.canny_low {
            if low <= 0.0 {
                return Err(format!("scoring.canny_low must be positive, got {low}"));
            }
        }
        if let Some(high) = self.scoring.canny_high {
            if high <= 0.0 {
                return Err(format!("scoring.canny_high must be positive, got {high}"));
            }
        }
        if let (Some(low), Some(high)) = (self.scoring.canny_low, self.scoring.canny_high) {
            if low >= high {
                return Err(format!(
                    "scoring.canny_low ({low}) must be below scoring.canny_high ({high})"
                ));
            }
        }
        if let Some(c) = self.scoring.min_face_confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(format!(
                    "scoring.min_face_confidence must be 0.0-1.0, got {c}"
                ));
            }
        }
        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        self.server.port = other.server.port.or(self.server.port);
        self.server.mode = other.server.mode.or_else(|| self.server.mode.take());

        self.scoring.canny_low = other.scoring.canny_low.or(self.scoring.canny_low);
        self.scoring.canny_high = other.scoring.canny_high.or(self.scoring.canny_high);
        self.scoring.min_face_confidence = other
            .scoring
            .min_face_confidence
            .or(self.scoring.min_face_confidence);

        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());
        self.storage.data_dir = other.storage.data_dir.or_else(|| self.storage.data_dir.take());
    }

    /// Resolve final settings: CLI beats config beats hardcoded defaults.
    #[must_use]
    pub fn resolve(&self, cli: &Cli) -> Settings {
        let mode = cli
            .mode
            .or_else(|| {
                self.server
                    .mode
                    .as_deref()
                    .and_then(AnalysisMode::from_config_name)
            })
            .unwrap_or_default();

        Settings {
            port: cli.port.or(self.server.port).unwrap_or(defaults::PORT),
            mode,
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| self.storage.data_dir.clone())
                .unwrap_or_else(|| PathBuf::from(defaults::DATA_DIR)),
            models_dir: cli.models_dir.clone().or_else(|| self.models.dir.clone()),
            canny_low: self.scoring.canny_low.unwrap_or(defaults::CANNY_LOW),
            canny_high: self.scoring.canny_high.unwrap_or(defaults::CANNY_HIGH),
            min_face_confidence: self
                .scoring
                .min_face_confidence
                .unwrap_or(defaults::MIN_FACE_CONFIDENCE),
        }
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wrinkle-scan").join("config.toml"))
}

/// Find project-local config by searching up from the current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.wrinkle-scan.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".wrinkle-scan.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
