//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Wrinkle Scan - facial wrinkle severity scoring API
#[derive(Debug, Parser)]
#[command(name = "wrinkle-scan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Listening port (binds all interfaces)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Analysis mode
    #[arg(long, value_enum)]
    pub mode: Option<AnalysisMode>,

    /// Data root for uploads and intermediate artifacts
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Download missing model files before serving
    #[arg(long)]
    pub fetch_models: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Whether an upload is scored whole or split into facial regions first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AnalysisMode {
    /// Score the uploaded image as one surface
    #[default]
    Single,
    /// Crop the face and score each anatomical region independently
    Regions,
}

impl AnalysisMode {
    /// Returns the mode name as used in config files and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Regions => "regions",
        }
    }

    /// Parses a config-file mode name.
    #[must_use]
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "single" => Some(Self::Single),
            "regions" => Some(Self::Regions),
            _ => None,
        }
    }
}
