//! Polyhead Classifiers
//!
//! Calibrated text classification over independently trained heads.
//!
//! A head runs preprocess → encode → one batched engine call → calibrate
//! and returns one labeled result per input. A composite runs several heads
//! over the same batch concurrently and reassembles per-input results:
//! - Preprocessing: unicode NFD, URL/e-mail/mention/hashtag stripping,
//!   lowercase, whitespace cleanup
//! - Tokenization: vocabulary whitespace tokenizer or a HuggingFace tokenizer
//! - Calibration: identity, temperature scaling, Platt scaling
//! - Engines: any [`InferenceEngine`], including candle modules
//!
//! Heads are synchronous. The composite is async and runs head work on
//! tokio's blocking pool.

pub mod calibration;
pub mod classifier;
pub mod composite;
pub mod config;
pub mod engine;
pub mod preprocessing;
pub mod single;
pub mod tokenizer;

pub use calibration::{Calibrator, CalibratorFactory};
pub use classifier::TextClassifier;
pub use composite::{CompositeClassifier, Heads};
pub use config::{
    CalibrationSpec, ClassifierSettings, HeadConfig, HeadConfigSpec, HeadSettings,
    PreprocessingConfig,
};
pub use engine::{
    CandleModuleEngine, ElementType, EngineEnvironment, EngineInput, EngineOutputs,
    EngineResource, InferenceEngine, Ownership,
};
pub use preprocessing::{BasicTextPreprocessor, NoOpPreprocessor, TextPreprocessor};
pub use single::{EncodingMode, HeadInputs, SingleModelClassifier};
pub use tokenizer::{HfTokenizer, Tokenizer, WhitespaceTokenizer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::TextClassifier;
    pub use crate::composite::CompositeClassifier;
    pub use crate::config::{ClassifierSettings, HeadConfig};
    pub use crate::engine::{EngineResource, InferenceEngine};
    pub use crate::single::{HeadInputs, SingleModelClassifier};
    pub use polyhead_core::prelude::*;
}
