//! Polyhead Core
//!
//! Core types shared across Polyhead components.
//!
//! This crate provides:
//! - The error taxonomy used by every classifier (configuration,
//!   validation, engine invocation, closed)
//! - Per-head and per-input composite classification results

pub mod error;
pub mod types;

pub use error::{EngineError, Error, Result};
pub use types::{argmax, ClassProbability, ClassificationResult, CompositeClassificationResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{EngineError, Error, Result};
    pub use crate::types::{ClassificationResult, CompositeClassificationResult};
}
