//! Test support utilities for wrinkle-scan.
//!
//! Provides synthetic image builders and in-memory encoders for exercising
//! the scoring pipeline and the HTTP endpoints without real photographs.

mod builders;

pub use builders::{jpeg_bytes, png_bytes, SyntheticImageBuilder};
