//! Head configuration and classifier settings
//!
//! [`HeadConfig`] and [`CalibrationSpec`] describe one trained head and are
//! produced by an external loader. They are validated once and never
//! mutated afterwards. [`ClassifierSettings`] is the YAML-facing layer for
//! composite-level tuning and per-head preprocessing/warmup.

use polyhead_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Calibration kind tag plus kind-specific numeric parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSpec {
    /// `identity`, `temperature` or `platt` (case-insensitive)
    #[serde(alias = "calibration_type", alias = "type")]
    kind: String,

    /// e.g. `{"temperature": 1.5}` or `{"a": 2.0, "b": -1.0}`
    #[serde(default)]
    parameters: HashMap<String, f64>,
}

impl CalibrationSpec {
    /// Create a calibration spec
    pub fn new(kind: impl Into<String>, parameters: HashMap<String, f64>) -> Self {
        Self {
            kind: kind.into(),
            parameters,
        }
    }

    /// Temperature scaling with the given temperature
    pub fn temperature(temperature: f64) -> Self {
        Self::new("temperature", HashMap::from([("temperature".to_string(), temperature)]))
    }

    /// Platt scaling with slope `a` and intercept `b`
    pub fn platt(a: f64, b: f64) -> Self {
        Self::new(
            "platt",
            HashMap::from([("a".to_string(), a), ("b".to_string(), b)]),
        )
    }

    /// The raw kind tag
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Parameter value, or `default` if absent
    pub fn parameter_or(&self, name: &str, default: f64) -> f64 {
        self.parameters.get(name).copied().unwrap_or(default)
    }
}

/// Unvalidated head description, as written in config files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadConfigSpec {
    /// Ordered class labels; index = model output column
    pub class_labels: Vec<String>,

    /// Name of the input tensor
    #[serde(default = "default_input_tensor")]
    pub input_tensor_name: String,

    /// Name of the output tensor
    #[serde(default = "default_output_tensor")]
    pub output_tensor_name: String,

    /// Fixed sequence length for token-mode heads
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Vocabulary for the built-in whitespace tokenizer
    #[serde(default)]
    pub vocabulary: Option<HashMap<String, i64>>,

    /// Optional calibration
    #[serde(default)]
    pub calibration: Option<CalibrationSpec>,
}

impl Default for HeadConfigSpec {
    fn default() -> Self {
        Self {
            class_labels: Vec::new(),
            input_tensor_name: default_input_tensor(),
            output_tensor_name: default_output_tensor(),
            max_sequence_length: default_max_sequence_length(),
            vocabulary: None,
            calibration: None,
        }
    }
}

fn default_input_tensor() -> String {
    "input".to_string()
}

fn default_output_tensor() -> String {
    "output".to_string()
}

fn default_max_sequence_length() -> usize {
    512
}

/// Validated, immutable configuration for one classification head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HeadConfigSpec", into = "HeadConfigSpec")]
pub struct HeadConfig {
    class_labels: Vec<String>,
    input_tensor_name: String,
    output_tensor_name: String,
    max_sequence_length: usize,
    vocabulary: Option<HashMap<String, i64>>,
    calibration: Option<CalibrationSpec>,
}

impl HeadConfig {
    /// Head with the given labels and default tensor names/sequence length
    pub fn new<I, S>(class_labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_spec(HeadConfigSpec {
            class_labels: class_labels.into_iter().map(Into::into).collect(),
            ..Default::default()
        })
    }

    /// Validate a spec into a head configuration
    pub fn from_spec(spec: HeadConfigSpec) -> Result<Self> {
        if spec.class_labels.is_empty() {
            return Err(Error::config("head requires at least one class label"));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = spec.class_labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(Error::config(format!("duplicate class label '{}'", dup)));
        }

        if spec.input_tensor_name.is_empty() || spec.output_tensor_name.is_empty() {
            return Err(Error::config("tensor names must not be empty"));
        }

        if spec.max_sequence_length == 0 {
            return Err(Error::config("max_sequence_length must be greater than zero"));
        }

        Ok(Self {
            class_labels: spec.class_labels,
            input_tensor_name: spec.input_tensor_name,
            output_tensor_name: spec.output_tensor_name,
            max_sequence_length: spec.max_sequence_length,
            vocabulary: spec.vocabulary,
            calibration: spec.calibration,
        })
    }

    /// Ordered class labels
    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    /// Number of classes the head predicts
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn input_tensor_name(&self) -> &str {
        &self.input_tensor_name
    }

    pub fn output_tensor_name(&self) -> &str {
        &self.output_tensor_name
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    pub fn vocabulary(&self) -> Option<&HashMap<String, i64>> {
        self.vocabulary.as_ref()
    }

    pub fn calibration(&self) -> Option<&CalibrationSpec> {
        self.calibration.as_ref()
    }

    /// Parse and validate a head configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

impl TryFrom<HeadConfigSpec> for HeadConfig {
    type Error = Error;

    fn try_from(spec: HeadConfigSpec) -> Result<Self> {
        Self::from_spec(spec)
    }
}

impl From<HeadConfig> for HeadConfigSpec {
    fn from(config: HeadConfig) -> Self {
        Self {
            class_labels: config.class_labels,
            input_tensor_name: config.input_tensor_name,
            output_tensor_name: config.output_tensor_name,
            max_sequence_length: config.max_sequence_length,
            vocabulary: config.vocabulary,
            calibration: config.calibration,
        }
    }
}

/// Text preprocessing flags, applied in a fixed order.
///
/// Flags missing from a settings file take their value from
/// [`PreprocessingConfig::standard`], so a partial block keeps lowercasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default = "PreprocessingConfig::standard")]
pub struct PreprocessingConfig {
    pub unicode_normalization: bool,
    pub remove_urls: bool,
    pub remove_emails: bool,
    pub remove_mentions: bool,
    pub remove_hashtags: bool,
    pub lowercase: bool,
    pub normalize_whitespace: bool,
    pub trim: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            unicode_normalization: true,
            remove_urls: false,
            remove_emails: false,
            remove_mentions: false,
            remove_hashtags: false,
            lowercase: false,
            normalize_whitespace: true,
            trim: true,
        }
    }
}

impl PreprocessingConfig {
    /// Common settings for classifier inputs: lowercase, unicode,
    /// whitespace collapse and trim
    pub fn standard() -> Self {
        Self {
            lowercase: true,
            ..Self::default()
        }
    }

    /// Every step disabled
    pub fn disabled() -> Self {
        Self {
            unicode_normalization: false,
            remove_urls: false,
            remove_emails: false,
            remove_mentions: false,
            remove_hashtags: false,
            lowercase: false,
            normalize_whitespace: false,
            trim: false,
        }
    }
}

/// Per-head runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadSettings {
    /// Preprocessing applied before encoding
    #[serde(default = "PreprocessingConfig::standard")]
    pub preprocessing: PreprocessingConfig,

    /// Run a warmup batch after construction
    #[serde(default)]
    pub warmup: bool,

    /// Sample texts for the warmup batch
    #[serde(default)]
    pub warmup_texts: Vec<String>,
}

impl Default for HeadSettings {
    fn default() -> Self {
        Self {
            preprocessing: PreprocessingConfig::standard(),
            warmup: false,
            warmup_texts: Vec::new(),
        }
    }
}

/// Settings for a composite classifier and its heads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Worker pool size; defaults to `min(#heads, available parallelism)`
    #[serde(default)]
    pub pool_size: Option<usize>,

    /// Grace period for in-flight work during `close()`
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Per-head settings keyed by head name
    #[serde(default)]
    pub heads: HashMap<String, HeadSettings>,
}

fn default_shutdown_grace_ms() -> u64 {
    30_000
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            pool_size: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
            heads: HashMap::new(),
        }
    }
}

impl ClassifierSettings {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == Some(0) {
            return Err(Error::config("pool_size must be greater than zero"));
        }
        Ok(())
    }

    /// Settings for the named head, falling back to defaults
    pub fn head(&self, name: &str) -> HeadSettings {
        self.heads.get(name).cloned().unwrap_or_default()
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Pool size for `head_count` heads
    pub fn resolved_pool_size(&self, head_count: usize) -> usize {
        self.pool_size
            .unwrap_or_else(|| head_count.min(num_cpus::get()))
            .max(1)
    }
}
