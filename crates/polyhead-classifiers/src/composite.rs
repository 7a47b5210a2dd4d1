//! Concurrent multi-head classification
//!
//! A [`CompositeClassifier`] runs every registered head over the same input
//! batch in parallel and reassembles one [`CompositeClassificationResult`]
//! per input, in input order, with heads in registration order.
//!
//! Each head's unit of work runs on tokio's blocking pool. A semaphore
//! sized to the pool size bounds how many head calls run at once, and a
//! task tracker lets `close()` wait for in-flight work.
//!
//! Failure is all-or-nothing: the first head to fail fails the whole call
//! as soon as it reports, and no partial results are returned.

use crate::classifier::TextClassifier;
use crate::config::ClassifierSettings;
use futures::future::try_join_all;
use polyhead_core::{ClassificationResult, CompositeClassificationResult, Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Heads keyed by registration name, in registration order
pub type Heads = Vec<(String, Arc<dyn TextClassifier>)>;

/// Classifier fanning each call out to several independent heads
pub struct CompositeClassifier {
    heads: Heads,
    owns_heads: bool,
    pool_size: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown_grace: Duration,
    warmup_plan: HashMap<String, Vec<String>>,
    closed: AtomicBool,
}

impl CompositeClassifier {
    /// Create a composite with the default pool size,
    /// `min(#heads, available parallelism)`
    pub fn new(heads: Heads, owns_heads: bool) -> Result<Self> {
        Self::from_settings(heads, &ClassifierSettings::default(), owns_heads)
    }

    /// Create a composite with an explicit pool size
    pub fn with_pool_size(heads: Heads, pool_size: usize, owns_heads: bool) -> Result<Self> {
        let settings = ClassifierSettings {
            pool_size: Some(pool_size),
            ..Default::default()
        };
        Self::from_settings(heads, &settings, owns_heads)
    }

    /// Create a composite from loaded settings.
    ///
    /// Heads whose settings enable warmup get their sample texts recorded
    /// for [`CompositeClassifier::warmup_configured`].
    pub fn from_settings(
        heads: Heads,
        settings: &ClassifierSettings,
        owns_heads: bool,
    ) -> Result<Self> {
        if heads.is_empty() {
            return Err(Error::config(
                "composite classifier needs at least one head",
            ));
        }

        let mut seen = HashSet::new();
        for (name, _) in &heads {
            if !seen.insert(name.as_str()) {
                return Err(Error::config(format!("duplicate head name '{}'", name)));
            }
        }

        if settings.pool_size == Some(0) {
            return Err(Error::config("pool_size must be greater than zero"));
        }

        for name in settings.heads.keys() {
            if !seen.contains(name.as_str()) {
                warn!(head = %name, "Settings reference a head that is not registered");
            }
        }

        let warmup_plan = heads
            .iter()
            .filter_map(|(name, _)| {
                let head_settings = settings.head(name);
                (head_settings.warmup && !head_settings.warmup_texts.is_empty())
                    .then(|| (name.clone(), head_settings.warmup_texts))
            })
            .collect();

        let pool_size = settings.resolved_pool_size(heads.len());

        let classifier = Self {
            heads,
            owns_heads,
            pool_size,
            permits: Arc::new(Semaphore::new(pool_size)),
            tracker: TaskTracker::new(),
            shutdown_grace: settings.shutdown_grace(),
            warmup_plan,
            closed: AtomicBool::new(false),
        };

        info!(
            heads = ?classifier.head_names().collect::<Vec<_>>(),
            pool_size,
            owns_heads,
            "Created composite classifier"
        );

        Ok(classifier)
    }

    /// Head names in registration order
    pub fn head_names(&self) -> impl Iterator<Item = &str> {
        self.heads.iter().map(|(name, _)| name.as_str())
    }

    pub fn head_count(&self) -> usize {
        self.heads.len()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Classify one text with every head
    pub async fn classify(&self, text: &str) -> Result<CompositeClassificationResult> {
        let owned = text.to_string();
        let outcomes = self
            .fan_out("classify", move |_, head| head.classify(&owned))
            .await?;

        let results = self
            .head_names()
            .map(str::to_string)
            .zip(outcomes)
            .collect();

        Ok(CompositeClassificationResult::new(text, results))
    }

    /// Classify a batch with every head; one result per input, in input order
    pub async fn classify_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<CompositeClassificationResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch = Arc::new(texts.to_vec());
        let per_head = self
            .fan_out("classify_batch", move |_, head| head.classify_batch(&batch))
            .await?;

        self.transpose(texts, per_head)
    }

    /// Run sample texts through every head, discarding the output
    pub async fn warmup(&self, sample_texts: &[String]) -> Result<()> {
        if sample_texts.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let samples = Arc::new(sample_texts.to_vec());
        self.fan_out("warmup", move |_, head| head.warmup(&samples))
            .await?;

        info!(
            samples = sample_texts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Composite warmup complete"
        );
        Ok(())
    }

    /// Warm up the heads whose settings enable it, each with its own texts
    pub async fn warmup_configured(&self) -> Result<()> {
        if self.warmup_plan.is_empty() {
            return Ok(());
        }

        let plan = Arc::new(self.warmup_plan.clone());
        self.fan_out("warmup", move |name, head| match plan.get(name) {
            Some(texts) => head.warmup(texts),
            None => Ok(()),
        })
        .await?;

        info!(heads = ?self.warmup_plan.keys().collect::<Vec<_>>(), "Configured warmup complete");
        Ok(())
    }

    /// Stop accepting work, wait for in-flight head calls up to the grace
    /// period, then close owned heads. Idempotent; never fails.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(heads = self.heads.len(), "Closing composite classifier");

        self.permits.close();
        self.tracker.close();

        if tokio::time::timeout(self.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            // blocking threads cannot be interrupted; they finish detached
            warn!(
                in_flight = self.tracker.len(),
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "Head calls still running after shutdown grace period, abandoning them"
            );
        }

        if self.owns_heads {
            for (name, head) in &self.heads {
                debug!(head = %name, "Closing head");
                head.close();
            }
        }
    }

    /// Run `work` once per head on the blocking pool and collect the
    /// outputs in registration order.
    async fn fan_out<T, F>(&self, op: &'static str, work: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&str, &dyn TextClassifier) -> Result<T> + Send + Sync + 'static,
    {
        if self.is_closed() {
            return Err(Error::Closed("composite classifier".to_string()));
        }

        let start = Instant::now();
        let work = Arc::new(work);
        let mut handles = Vec::with_capacity(self.heads.len());

        for (name, head) in &self.heads {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| Error::Closed("composite classifier".to_string()))?;

            let name = name.clone();
            let head = Arc::clone(head);
            let work = Arc::clone(&work);

            handles.push(self.tracker.spawn_blocking(move || {
                let _permit = permit;
                work(&name, head.as_ref())
            }));
        }

        // resolves on the first failure; outputs stay in registration order.
        // Heads still running when it fails finish detached and are awaited
        // by close().
        let joined = handles
            .into_iter()
            .zip(self.heads.iter())
            .map(|(handle, (name, _))| async move {
                let outcome = handle
                    .await
                    .map_err(|e| {
                        Error::internal(format!("head '{}' task did not complete: {}", name, e))
                    })
                    .and_then(|r| r);

                if let Err(e) = &outcome {
                    error!(head = %name, op, error = %e, "Head failed");
                }
                outcome
            });

        let outcome = try_join_all(joined).await;

        metrics::counter!("polyhead_composite_calls_total", "op" => op).increment(1);
        metrics::histogram!("polyhead_composite_latency_seconds", "op" => op)
            .record(start.elapsed().as_secs_f64());

        if outcome.is_err() {
            metrics::counter!("polyhead_composite_failures_total", "op" => op).increment(1);
        }
        outcome
    }

    /// Turn per-head result lists into per-input composite results
    fn transpose(
        &self,
        texts: &[String],
        per_head: Vec<Vec<ClassificationResult>>,
    ) -> Result<Vec<CompositeClassificationResult>> {
        for ((name, _), results) in self.heads.iter().zip(&per_head) {
            if results.len() != texts.len() {
                return Err(Error::validation(format!(
                    "head '{}' returned {} results for {} inputs",
                    name,
                    results.len(),
                    texts.len()
                )));
            }
        }

        let mut columns: Vec<_> = per_head.into_iter().map(Vec::into_iter).collect();

        texts
            .iter()
            .map(|text| {
                let results = self
                    .head_names()
                    .zip(columns.iter_mut())
                    .map(|(name, column)| column.next().map(|r| (name.to_string(), r)))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| Error::internal("head results ran out during reassembly"))?;
                Ok(CompositeClassificationResult::new(text.as_str(), results))
            })
            .collect()
    }
}
