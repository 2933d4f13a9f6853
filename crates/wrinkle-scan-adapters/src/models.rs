//! Model downloading and caching.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Placeholder checksum indicating verification should be skipped.
const PLACEHOLDER_CHECKSUM: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Download URL (GitHub releases).
    pub url: &'static str,
    /// Expected SHA256 hash. All zeros skips verification during development.
    pub sha256: &'static str,
    /// Filename in the models directory.
    pub filename: &'static str,
}

/// Known models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "blazeface",
        url: "https://github.com/wrinkle-scan/wrinkle-scan/releases/download/models-v1/blazeface.safetensors",
        sha256: "0000000000000000000000000000000000000000000000000000000000000000", // TODO: pin once models-v1 is published
        filename: "blazeface.safetensors",
    },
    ModelInfo {
        name: "landmarks68",
        url: "https://github.com/wrinkle-scan/wrinkle-scan/releases/download/models-v1/landmarks68.safetensors",
        sha256: "0000000000000000000000000000000000000000000000000000000000000000", // TODO: pin once models-v1 is published
        filename: "landmarks68.safetensors",
    },
];

/// Runtime override for the models directory.
static MODELS_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Overrides the models directory, or clears the override with `None`.
pub fn set_models_dir(dir: Option<PathBuf>) {
    if let Ok(mut slot) = MODELS_DIR_OVERRIDE.lock() {
        *slot = dir;
    }
}

/// Returns the models directory path.
///
/// Uses the override when set, otherwise
/// `XDG_DATA_HOME/wrinkle-scan/models` (or the platform equivalent).
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Ok(slot) = MODELS_DIR_OVERRIDE.lock() {
        if let Some(dir) = slot.as_ref() {
            return dir.clone();
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wrinkle-scan")
        .join("models")
}

/// Ensures all required models are downloaded.
///
/// # Errors
///
/// Returns an error if the models directory cannot be created, a download
/// fails, or a checksum doesn't match.
pub fn ensure_models() -> Result<()> {
    let dir = models_dir();
    fs::create_dir_all(&dir).context("Failed to create models directory")?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
        } else {
            download_model(model, &path)?;
        }
    }
    Ok(())
}

/// Downloads a model from its URL and verifies the checksum.
fn download_model(model: &ModelInfo, path: &PathBuf) -> Result<()> {
    info!("Downloading model: {}", model.name);

    let response = reqwest::blocking::get(model.url)
        .with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let bytes = response
        .bytes()
        .with_context(|| format!("Failed to read response for {}", model.name))?;

    if model.sha256 == PLACEHOLDER_CHECKSUM {
        debug!(
            "Skipping checksum verification for {} (placeholder checksum)",
            model.name
        );
    } else {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = format!("{:x}", hasher.finalize());

        if hash != model.sha256 {
            anyhow::bail!(
                "Checksum mismatch for {}: expected {}, got {}. \
                 Delete {} and re-run to fetch a fresh copy.",
                model.name,
                model.sha256,
                hash,
                path.display()
            );
        }
    }

    fs::write(path, &bytes).with_context(|| format!("Failed to write {}", model.name))?;

    info!("Downloaded {} ({} bytes)", model.name, bytes.len());
    Ok(())
}

/// Returns the path a model file lives at.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| models_dir().join(m.filename))
}

/// Checks whether every known model is installed.
#[must_use]
pub fn all_models_installed() -> bool {
    let dir = models_dir();
    MODELS.iter().all(|m| dir.join(m.filename).exists())
}

/// Lists known models with installation status.
#[must_use]
pub fn list_models() -> Vec<(String, bool)> {
    let dir = models_dir();
    MODELS
        .iter()
        .map(|m| (m.name.to_string(), dir.join(m.filename).exists()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_known() {
        let path = model_path("blazeface");
        assert!(path.is_some());
        let path = path.unwrap_or_else(|| panic!("should have path"));
        assert!(path.ends_with("blazeface.safetensors"));

        let path = model_path("landmarks68");
        assert!(path.is_some_and(|p| p.ends_with("landmarks68.safetensors")));
    }

    #[test]
    fn test_model_path_unknown() {
        assert!(model_path("unknown").is_none());
    }

    #[test]
    fn test_models_dir_override_roundtrip() {
        // The override is process-global; set and clear it inside one test.
        let custom = PathBuf::from("/tmp/wrinkle-scan-test-models");
        set_models_dir(Some(custom.clone()));
        assert_eq!(models_dir(), custom);

        set_models_dir(None);
        assert!(models_dir().ends_with("wrinkle-scan/models") || models_dir() != custom);
    }

    #[test]
    fn test_list_models_covers_registry() {
        let listed = list_models();
        assert_eq!(listed.len(), MODELS.len());
        assert!(listed.iter().any(|(name, _)| name == "blazeface"));
        assert!(listed.iter().any(|(name, _)| name == "landmarks68"));
    }
}
