//! Classifier trait shared by heads registered in a composite

use polyhead_core::{ClassificationResult, Error, Result};

/// Trait for single-task text classifiers.
///
/// Calls are synchronous and block until the underlying inference
/// completes. Implementations must support concurrent calls from
/// multiple threads.
pub trait TextClassifier: Send + Sync {
    /// Get the classifier name
    fn name(&self) -> &str;

    /// Labels in model output order
    fn class_labels(&self) -> &[String];

    /// Classify a batch of texts; results follow input order
    fn classify_batch(&self, texts: &[String]) -> Result<Vec<ClassificationResult>>;

    /// Classify a single text
    fn classify(&self, text: &str) -> Result<ClassificationResult> {
        self.classify_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal(format!("'{}' returned no result", self.name())))
    }

    /// Run sample texts through the pipeline, discarding the output
    fn warmup(&self, sample_texts: &[String]) -> Result<()> {
        self.classify_batch(sample_texts).map(|_| ())
    }

    /// Release resources. Must be idempotent and must not fail.
    fn close(&self);
}
