//! Error types for Polyhead

/// Result type alias using Polyhead's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for classification operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or incomplete configuration, raised at construction time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Inputs or intermediate results that violate a per-call contract
    #[error("validation error: {0}")]
    Validation(String),

    /// The inference engine failed while executing a head's model graph
    #[error("inference failed for head '{head}'")]
    EngineInvocation {
        head: String,
        #[source]
        source: EngineError,
    },

    /// A call reached a classifier after it was closed
    #[error("classifier '{0}' is closed")]
    Closed(String),

    /// Filesystem errors while reading settings
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// A worker task panicked or was cancelled
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wrap an engine failure for the named head
    pub fn engine(head: impl Into<String>, source: EngineError) -> Self {
        Self::EngineInvocation {
            head: head.into(),
            source,
        }
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was raised while building a classifier
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Serialization(_))
    }
}

/// Failure reported by an inference engine implementation
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EngineError {
    /// Create an engine error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an engine error carrying the underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The engine-supplied message
    pub fn message(&self) -> &str {
        &self.message
    }
}
