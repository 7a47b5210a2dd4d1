//! Mock heads and engines for testing
//!
//! Provides configurable implementations of `TextClassifier` and
//! `InferenceEngine` for testing composite fan-out, ordering, and error
//! handling without a real model.

#![allow(dead_code)]

use candle_core::{Device, Tensor};
use polyhead_classifiers::{ElementType, EngineInput, EngineOutputs, InferenceEngine, TextClassifier};
use polyhead_core::{ClassificationResult, EngineError, Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Tracks how many head calls are running at once
#[derive(Default)]
pub struct Concurrency {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Concurrency {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A configurable binary head
pub struct MockHead {
    name: String,
    labels: Vec<String>,
    score: f64,
    simulated_latency: Option<Duration>,
    barrier: Option<Arc<Barrier>>,
    concurrency: Option<Arc<Concurrency>>,
    drop_last: bool,
    call_count: AtomicU32,
    warmup_count: AtomicU32,
    close_count: AtomicU32,
}

impl MockHead {
    /// Create a new mock head with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: vec!["negative".to_string(), "positive".to_string()],
            score: 0.3,
            simulated_latency: None,
            barrier: None,
            concurrency: None,
            drop_last: false,
            call_count: AtomicU32::new(0),
            warmup_count: AtomicU32::new(0),
            close_count: AtomicU32::new(0),
        }
    }

    /// Set the positive-class probability for neutral texts
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Block the calling thread for `latency` on every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = Some(latency);
        self
    }

    /// Wait on a shared barrier before answering
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Record in-flight calls into a shared tracker
    pub fn with_concurrency(mut self, concurrency: Arc<Concurrency>) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Return one result fewer than the batch size
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn warmup_count(&self) -> u32 {
        self.warmup_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    fn score_for(&self, text: &str) -> f64 {
        if text.contains("UNSAFE") {
            0.95
        } else if text.contains("SAFE") {
            0.05
        } else {
            self.score
        }
    }
}

impl TextClassifier for MockHead {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn classify_batch(&self, texts: &[String]) -> Result<Vec<ClassificationResult>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(concurrency) = &self.concurrency {
            concurrency.enter();
        }

        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if let Some(latency) = self.simulated_latency {
            std::thread::sleep(latency);
        }

        let keep = if self.drop_last {
            texts.len().saturating_sub(1)
        } else {
            texts.len()
        };

        let results = texts
            .iter()
            .take(keep)
            .map(|text| {
                let p = self.score_for(text);
                ClassificationResult::from_distribution(&self.labels, &[1.0 - p, p], false)
            })
            .collect();

        if let Some(concurrency) = &self.concurrency {
            concurrency.exit();
        }
        results
    }

    fn warmup(&self, sample_texts: &[String]) -> Result<()> {
        self.warmup_count.fetch_add(1, Ordering::SeqCst);
        self.classify_batch(sample_texts).map(|_| ())
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A head that always fails - for testing error paths
pub struct FailingHead {
    name: String,
    labels: Vec<String>,
    error_message: String,
}

impl FailingHead {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: vec!["negative".to_string(), "positive".to_string()],
            error_message: "Simulated inference failure".to_string(),
        }
    }

    /// Set a custom error message
    pub fn with_error(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }
}

impl TextClassifier for FailingHead {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn classify_batch(&self, _texts: &[String]) -> Result<Vec<ClassificationResult>> {
        Err(Error::engine(&self.name, EngineError::new(&self.error_message)))
    }

    fn close(&self) {}
}

/// Engine scoring each row by its share of known tokens.
///
/// Token input: positive probability is the fraction of non-pad,
/// non-unknown ids. Text input: positive when the text contains "good".
pub struct MockEngine {
    element_type: ElementType,
    pad_id: i64,
    unknown_id: i64,
    call_count: AtomicU32,
}

impl MockEngine {
    pub fn tokens() -> Self {
        Self {
            element_type: ElementType::Int64,
            pad_id: 0,
            unknown_id: 1,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn text() -> Self {
        Self {
            element_type: ElementType::String,
            ..Self::tokens()
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn rows(&self, input: EngineInput) -> std::result::Result<Vec<f32>, EngineError> {
        let scores: Vec<f32> = match input {
            EngineInput::Text(texts) => texts
                .iter()
                .map(|t| if t.contains("good") { 0.9 } else { 0.2 })
                .collect(),
            EngineInput::Tokens(ids) => ids
                .to_vec2::<i64>()
                .map_err(|e| EngineError::with_source("bad id matrix", e))?
                .iter()
                .map(|row| {
                    let words = row.iter().filter(|&&id| id != self.pad_id).count();
                    let known = row
                        .iter()
                        .filter(|&&id| id != self.pad_id && id != self.unknown_id)
                        .count();
                    if words == 0 {
                        0.5
                    } else {
                        known as f32 / words as f32
                    }
                })
                .collect(),
        };

        Ok(scores.into_iter().flat_map(|p| [1.0 - p, p]).collect())
    }
}

impl InferenceEngine for MockEngine {
    fn input_element_type(&self, _input_name: &str) -> Option<ElementType> {
        Some(self.element_type)
    }

    fn run(&self, _input_name: &str, input: EngineInput) -> std::result::Result<EngineOutputs, EngineError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let batch = input.batch_size();
        let flat = self.rows(input)?;
        let probs = Tensor::from_vec(flat, (batch, 2), &Device::Cpu)
            .map_err(|e| EngineError::with_source("bad output shape", e))?;
        Ok(HashMap::from([("output".to_string(), probs)]))
    }
}

pub fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_head_dynamic_scoring() {
        let head = MockHead::new("test").with_score(0.6);
        let results = head
            .classify_batch(&texts(&["UNSAFE stuff", "SAFE stuff", "other"]))
            .unwrap();

        assert_eq!(results[0].predicted_label, "positive");
        assert_eq!(results[1].predicted_label, "negative");
        assert_eq!(results[2].predicted_label, "positive");
        assert_eq!(head.call_count(), 1);
    }

    #[test]
    fn test_failing_head() {
        let head = FailingHead::new("fail-test").with_error("Custom error");
        assert!(head.classify("test").is_err());
    }

    #[test]
    fn test_mock_head_latency() {
        let head = MockHead::new("slow").with_latency(Duration::from_millis(10));

        let start = std::time::Instant::now();
        let _ = head.classify("test");

        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_mock_engine_token_scoring() {
        let engine = MockEngine::tokens();
        let ids = Tensor::from_vec(vec![2i64, 1, 0, 0], (2, 2), &Device::Cpu).unwrap();

        let outputs = engine.run("input", EngineInput::Tokens(ids)).unwrap();
        let probs = outputs["output"].to_vec2::<f32>().unwrap();

        assert_eq!(probs, vec![vec![0.5, 0.5], vec![0.5, 0.5]]);
        assert_eq!(engine.call_count(), 1);
    }
}
