//! Inference engine boundary
//!
//! The engine executes a loaded model graph. Classifiers only see the
//! [`InferenceEngine`] trait: one input tensor in, named output tensors
//! out. Engine handles must tolerate concurrent `run` calls from several
//! threads without external locking.
//!
//! [`EngineResource`] owns a head's session and, optionally, a handle on
//! the process-wide [`EngineEnvironment`]. Release order is session
//! first, then the environment when it is owned.

use candle_core::{Device, Module, Tensor, D};
use polyhead_core::EngineError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Element type declared by a model input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Int64,
    Float32,
    String,
}

/// One batched input for a single engine call
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// `i64` id matrix of shape `[batch, max_len]`
    Tokens(Tensor),

    /// Raw strings, one per batch row
    Text(Vec<String>),
}

impl EngineInput {
    /// Number of rows in the batch
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Tokens(t) => t.dims().first().copied().unwrap_or(0),
            Self::Text(texts) => texts.len(),
        }
    }
}

/// Output tensors keyed by output name
pub type EngineOutputs = HashMap<String, Tensor>;

/// Trait for engines that execute a trained model graph
pub trait InferenceEngine: Send + Sync {
    /// Declared element type of the named input, if the model has it
    fn input_element_type(&self, input_name: &str) -> Option<ElementType>;

    /// Run the model on one batched input
    fn run(&self, input_name: &str, input: EngineInput) -> Result<EngineOutputs, EngineError>;

    /// Release the session
    fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Process-wide engine runtime state shared by sessions
pub trait EngineEnvironment: Send + Sync {
    fn close(&self) -> Result<(), EngineError>;
}

/// Whether a resource releases the environment it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Shared,
}

/// Ownership-tagged engine session plus optional environment
pub struct EngineResource {
    session: Arc<dyn InferenceEngine>,
    environment: Option<(Arc<dyn EngineEnvironment>, Ownership)>,
    closed: AtomicBool,
}

impl EngineResource {
    /// Resource holding only a session
    pub fn new(session: Arc<dyn InferenceEngine>) -> Self {
        Self {
            session,
            environment: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Resource holding a session and an environment handle
    pub fn with_environment(
        session: Arc<dyn InferenceEngine>,
        environment: Arc<dyn EngineEnvironment>,
        ownership: Ownership,
    ) -> Self {
        Self {
            session,
            environment: Some((environment, ownership)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &dyn InferenceEngine {
        self.session.as_ref()
    }

    pub fn ownership(&self) -> Option<Ownership> {
        self.environment.as_ref().map(|(_, o)| *o)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release the session, then an owned environment. Idempotent;
    /// release failures are logged, never returned.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(e) = self.session.close() {
            warn!(error = %e, "Failed to close engine session");
        }

        if let Some((environment, Ownership::Owned)) = &self.environment {
            if let Err(e) = environment.close() {
                warn!(error = %e, "Failed to close engine environment");
            }
        }

        debug!("Engine resource released");
    }
}

impl Drop for EngineResource {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-process engine running a candle module over token matrices.
///
/// The module maps `[batch, max_len]` ids to `[batch, classes]` logits;
/// the engine applies softmax over the last dimension.
pub struct CandleModuleEngine<M> {
    module: M,
    input_name: String,
    output_name: String,
    device: Device,
}

impl<M: Module + Send + Sync> CandleModuleEngine<M> {
    pub fn new(module: M, input_name: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            module,
            input_name: input_name.into(),
            output_name: output_name.into(),
            device: Device::Cpu,
        }
    }

    /// Run on a specific device
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    fn forward(&self, ids: &Tensor) -> candle_core::Result<Tensor> {
        let ids = ids.to_device(&self.device)?;
        let logits = self.module.forward(&ids)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }
}

impl<M: Module + Send + Sync> InferenceEngine for CandleModuleEngine<M> {
    fn input_element_type(&self, input_name: &str) -> Option<ElementType> {
        (input_name == self.input_name).then_some(ElementType::Int64)
    }

    fn run(&self, input_name: &str, input: EngineInput) -> Result<EngineOutputs, EngineError> {
        if input_name != self.input_name {
            return Err(EngineError::new(format!("unknown input tensor '{}'", input_name)));
        }

        match input {
            EngineInput::Tokens(ids) => {
                let probs = self
                    .forward(&ids)
                    .map_err(|e| EngineError::with_source("candle forward pass failed", e))?;
                Ok(HashMap::from([(self.output_name.clone(), probs)]))
            }
            EngineInput::Text(_) => Err(EngineError::new(
                "candle module engine does not accept string input",
            )),
        }
    }
}
