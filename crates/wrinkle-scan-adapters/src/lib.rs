//! Wrinkle Scan Adapters - model fetching and artifact storage.

mod models;
mod storage;

pub use models::{
    all_models_installed, ensure_models, list_models, model_path, models_dir, set_models_dir,
    ModelInfo, MODELS,
};
pub use storage::ArtifactStore;
