//! Classification result types shared by single and composite classifiers

use crate::error::{Error, Result};
use serde::Serialize;

/// Probability assigned to a single class label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    /// Class label
    pub label: String,

    /// Probability (0.0-1.0)
    pub probability: f64,
}

/// Result of classifying one text with one head
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Label with the highest probability
    pub predicted_label: String,

    /// Probability of the predicted label
    pub confidence: f64,

    /// All class probabilities, ordered by the head's class index
    pub probabilities: Vec<ClassProbability>,

    /// Whether a non-identity calibrator produced the probabilities
    pub calibrated: bool,
}

impl ClassificationResult {
    /// Build a result from a probability row aligned with `labels`.
    ///
    /// The predicted label is the first label holding the maximum
    /// probability, so exact ties resolve to the lowest index.
    pub fn from_distribution(
        labels: &[String],
        probabilities: &[f64],
        calibrated: bool,
    ) -> Result<Self> {
        if labels.len() != probabilities.len() {
            return Err(Error::validation(format!(
                "expected {} probabilities to match class labels, got {}",
                labels.len(),
                probabilities.len()
            )));
        }

        let best = argmax(probabilities)
            .ok_or_else(|| Error::validation("cannot classify an empty probability row"))?;

        Ok(Self {
            predicted_label: labels[best].clone(),
            confidence: probabilities[best],
            probabilities: labels
                .iter()
                .zip(probabilities)
                .map(|(label, &probability)| ClassProbability {
                    label: label.clone(),
                    probability,
                })
                .collect(),
            calibrated,
        })
    }

    /// Probability recorded for `label`, if the head knows it
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }

    /// Check if confidence reaches the threshold
    pub fn exceeds_threshold(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// Index of the largest value; the lowest index wins exact ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut iter = values.iter().enumerate();
    let (mut best_idx, mut best) = iter.next().map(|(i, v)| (i, *v))?;

    for (i, &value) in iter {
        if value > best {
            best = value;
            best_idx = i;
        }
    }

    Some(best_idx)
}

/// Results from every registered head for one input text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeClassificationResult {
    text: String,
    results: Vec<(String, ClassificationResult)>,
}

impl CompositeClassificationResult {
    /// Create a composite result; `results` keeps head registration order
    pub fn new(text: impl Into<String>, results: Vec<(String, ClassificationResult)>) -> Self {
        Self {
            text: text.into(),
            results,
        }
    }

    /// The input text that was classified
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Per-head results in head registration order
    pub fn results(&self) -> impl Iterator<Item = (&str, &ClassificationResult)> {
        self.results.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Result produced by the named head
    pub fn result(&self, head: &str) -> Option<&ClassificationResult> {
        self.results
            .iter()
            .find(|(name, _)| name == head)
            .map(|(_, r)| r)
    }

    /// Names of the heads that contributed results
    pub fn head_names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|(name, _)| name.as_str())
    }

    /// Predicted label per head
    pub fn predicted_labels(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .map(|(name, r)| (name.as_str(), r.predicted_label.as_str()))
            .collect()
    }

    /// Confidence per head
    pub fn confidences(&self) -> Vec<(&str, f64)> {
        self.results
            .iter()
            .map(|(name, r)| (name.as_str(), r.confidence))
            .collect()
    }

    /// Check if any head predicted `label`
    pub fn any_predicted(&self, label: &str) -> bool {
        self.results.iter().any(|(_, r)| r.predicted_label == label)
    }

    /// Number of heads that contributed results
    pub fn head_count(&self) -> usize {
        self.results.len()
    }

    /// Consume the composite, yielding the per-head results
    pub fn into_results(self) -> Vec<(String, ClassificationResult)> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_argmax_prefers_lowest_index_on_tie() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_from_distribution() {
        let result =
            ClassificationResult::from_distribution(&labels(&["low", "high"]), &[0.3, 0.7], true)
                .unwrap();

        assert_eq!(result.predicted_label, "high");
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.probabilities.len(), 2);
        assert_eq!(result.probabilities[0].label, "low");
        assert_eq!(result.probability_of("low"), Some(0.3));
        assert!(result.calibrated);
        assert!(result.exceeds_threshold(0.7));
    }

    #[test]
    fn test_from_distribution_rejects_length_mismatch() {
        let err = ClassificationResult::from_distribution(&labels(&["a", "b"]), &[1.0], false)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_composite_accessors() {
        let address =
            ClassificationResult::from_distribution(&labels(&["valid", "invalid"]), &[0.9, 0.1], false)
                .unwrap();
        let risk =
            ClassificationResult::from_distribution(&labels(&["low", "high"]), &[0.85, 0.15], false)
                .unwrap();

        let composite = CompositeClassificationResult::new(
            "test input",
            vec![("address".into(), address.clone()), ("risk".into(), risk)],
        );

        assert_eq!(composite.text(), "test input");
        assert_eq!(composite.head_count(), 2);
        assert_eq!(composite.result("address"), Some(&address));
        assert!(composite.result("missing").is_none());
        assert_eq!(
            composite.predicted_labels(),
            vec![("address", "valid"), ("risk", "low")]
        );
        assert_eq!(composite.confidences(), vec![("address", 0.9), ("risk", 0.85)]);
        assert!(composite.any_predicted("valid"));
        assert!(composite.any_predicted("low"));
        assert!(!composite.any_predicted("unknown"));
        assert_eq!(composite.head_names().collect::<Vec<_>>(), vec!["address", "risk"]);
    }

    #[test]
    fn test_result_serializes_to_json() {
        let result =
            ClassificationResult::from_distribution(&labels(&["no", "yes"]), &[0.25, 0.75], false)
                .unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["predicted_label"], "yes");
        assert_eq!(json["probabilities"][1]["probability"], 0.75);
    }
}
