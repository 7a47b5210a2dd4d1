//! Single-head classification pipeline
//!
//! preprocess → encode → one batched engine call → calibrate → result.
//!
//! The encoding mode is fixed at construction from the model's declared
//! input element type: string inputs receive preprocessed text directly,
//! integer inputs receive a `[batch, max_len]` id matrix from the head's
//! tokenizer.

use crate::calibration::{Calibrator, CalibratorFactory};
use crate::classifier::TextClassifier;
use crate::config::{HeadConfig, HeadSettings};
use crate::engine::{ElementType, EngineInput, EngineResource};
use crate::preprocessing::{BasicTextPreprocessor, TextPreprocessor};
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};
use candle_core::{DType, Device, Tensor};
use polyhead_core::{ClassificationResult, EngineError, Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How a head feeds text to its engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    /// Preprocessed strings passed straight to the engine
    RawText,
    /// Fixed-length token id matrix
    Tokenized,
}

enum HeadEncoder {
    RawText,
    Tokenized(Arc<dyn Tokenizer>),
}

/// Collaborators a head needs besides its configuration
pub struct HeadInputs {
    engine: EngineResource,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    preprocessor: Option<Arc<dyn TextPreprocessor>>,
}

impl HeadInputs {
    pub fn new(engine: EngineResource) -> Self {
        Self {
            engine,
            tokenizer: None,
            preprocessor: None,
        }
    }

    /// Tokenizer for token-mode heads; defaults to a whitespace tokenizer
    /// over the config vocabulary
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Preprocessor; defaults to [`BasicTextPreprocessor::standard`]
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn TextPreprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Apply a head's runtime settings
    pub fn with_settings(self, settings: &HeadSettings) -> Result<Self> {
        let preprocessor = BasicTextPreprocessor::new(settings.preprocessing)?;
        Ok(self.with_preprocessor(Arc::new(preprocessor)))
    }
}

/// Classifier running one trained head through its engine
pub struct SingleModelClassifier {
    name: String,
    config: HeadConfig,
    engine: EngineResource,
    encoder: HeadEncoder,
    preprocessor: Arc<dyn TextPreprocessor>,
    calibrator: Calibrator,
}

impl SingleModelClassifier {
    /// Build a ready classifier.
    ///
    /// # Errors
    ///
    /// Configuration errors for an unknown calibration kind, Platt
    /// calibration on a non-binary head, an unsupported input element type,
    /// or a token-mode model without any tokenizer.
    pub fn new(name: impl Into<String>, config: HeadConfig, inputs: HeadInputs) -> Result<Self> {
        let name = name.into();
        let calibrator = CalibratorFactory::create(config.calibration())?;

        if matches!(calibrator, Calibrator::Platt { .. }) && config.num_classes() != 2 {
            return Err(Error::config(format!(
                "head '{}' uses Platt calibration but has {} classes",
                name,
                config.num_classes()
            )));
        }

        let element_type = inputs
            .engine
            .session()
            .input_element_type(config.input_tensor_name());

        let encoder = match element_type {
            Some(ElementType::String) => HeadEncoder::RawText,
            Some(ElementType::Int64) | None => {
                if element_type.is_none() {
                    warn!(
                        head = %name,
                        input = config.input_tensor_name(),
                        "Could not detect input tensor type, assuming int64 token ids"
                    );
                }
                let tokenizer = match (inputs.tokenizer, config.vocabulary()) {
                    (Some(tokenizer), _) => tokenizer,
                    (None, Some(vocab)) => {
                        Arc::new(WhitespaceTokenizer::from_vocabulary(vocab.clone()))
                            as Arc<dyn Tokenizer>
                    }
                    (None, None) => {
                        return Err(Error::config(format!(
                            "head '{}' takes token ids but no tokenizer or vocabulary was provided",
                            name
                        )))
                    }
                };
                HeadEncoder::Tokenized(tokenizer)
            }
            Some(other) => {
                return Err(Error::config(format!(
                    "head '{}' input '{}' has unsupported element type {:?}",
                    name,
                    config.input_tensor_name(),
                    other
                )))
            }
        };

        let preprocessor = match inputs.preprocessor {
            Some(p) => p,
            None => Arc::new(BasicTextPreprocessor::standard()?),
        };

        let classifier = Self {
            name,
            config,
            engine: inputs.engine,
            encoder,
            preprocessor,
            calibrator,
        };

        info!(
            head = %classifier.name,
            encoding = ?classifier.encoding(),
            calibration = %classifier.calibrator,
            classes = classifier.config.num_classes(),
            "Loaded classification head"
        );

        Ok(classifier)
    }

    pub fn config(&self) -> &HeadConfig {
        &self.config
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn encoding(&self) -> EncodingMode {
        match self.encoder {
            HeadEncoder::RawText => EncodingMode::RawText,
            HeadEncoder::Tokenized(_) => EncodingMode::Tokenized,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    fn encode(&self, texts: Vec<String>) -> Result<EngineInput> {
        match &self.encoder {
            HeadEncoder::RawText => Ok(EngineInput::Text(texts)),
            HeadEncoder::Tokenized(tokenizer) => {
                let max_len = self.config.max_sequence_length();
                let rows = tokenizer.tokenize_batch(&texts, max_len)?;
                let flat: Vec<i64> = rows.into_iter().flatten().collect();

                Tensor::from_vec(flat, (texts.len(), max_len), &Device::Cpu)
                    .map(EngineInput::Tokens)
                    .map_err(|e| {
                        Error::engine(
                            &self.name,
                            EngineError::with_source("Failed to create input tensor", e),
                        )
                    })
            }
        }
    }

    /// Decode a `[batch, classes]` probability tensor into rows
    fn decode(&self, output: &Tensor, batch: usize) -> Result<Vec<Vec<f64>>> {
        let (rows, cols) = output.dims2().map_err(|e| {
            Error::validation(format!("head '{}' output is not a matrix: {}", self.name, e))
        })?;

        if rows != batch || cols != self.config.num_classes() {
            return Err(Error::validation(format!(
                "head '{}' returned a [{}, {}] output for a batch of {} with {} classes",
                self.name,
                rows,
                cols,
                batch,
                self.config.num_classes()
            )));
        }

        output
            .to_dtype(DType::F64)
            .and_then(|t| t.to_vec2::<f64>())
            .map_err(|e| {
                Error::engine(
                    &self.name,
                    EngineError::with_source("Failed to read output tensor", e),
                )
            })
    }

    fn build_result(&self, raw: &[f64]) -> Result<ClassificationResult> {
        let calibrated = self.calibrator.calibrate(raw)?;
        ClassificationResult::from_distribution(
            self.config.class_labels(),
            &calibrated,
            !self.calibrator.is_identity(),
        )
    }
}

impl TextClassifier for SingleModelClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_labels(&self) -> &[String] {
        self.config.class_labels()
    }

    fn classify_batch(&self, texts: &[String]) -> Result<Vec<ClassificationResult>> {
        if self.is_closed() {
            return Err(Error::Closed(self.name.clone()));
        }

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let batch = texts.len();

        let preprocessed = self.preprocessor.preprocess_batch(texts);
        let input = self.encode(preprocessed)?;

        // one engine call for the whole batch; outputs drop at scope end on
        // every path
        let outputs = self
            .engine
            .session()
            .run(self.config.input_tensor_name(), input)
            .map_err(|e| {
                error!(head = %self.name, error = %e, "Inference failed");
                metrics::counter!("polyhead_head_failures_total", "head" => self.name.clone())
                    .increment(1);
                Error::engine(&self.name, e)
            })?;

        let output = outputs.get(self.config.output_tensor_name()).ok_or_else(|| {
            Error::validation(format!(
                "head '{}' produced no output tensor '{}'",
                self.name,
                self.config.output_tensor_name()
            ))
        })?;

        let results = self
            .decode(output, batch)?
            .iter()
            .map(|row| self.build_result(row))
            .collect::<Result<Vec<_>>>()?;

        let elapsed = start.elapsed();
        metrics::counter!("polyhead_head_inferences_total", "head" => self.name.clone())
            .increment(batch as u64);
        metrics::histogram!("polyhead_head_batch_latency_seconds", "head" => self.name.clone())
            .record(elapsed.as_secs_f64());
        debug!(head = %self.name, batch, latency_us = elapsed.as_micros() as u64, "Classified batch");

        Ok(results)
    }

    fn close(&self) {
        if !self.engine.is_closed() {
            info!(head = %self.name, "Closing classification head");
        }
        self.engine.close();
    }
}

impl Drop for SingleModelClassifier {
    fn drop(&mut self) {
        self.close();
    }
}
