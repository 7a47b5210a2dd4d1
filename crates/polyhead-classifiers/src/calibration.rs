//! Probability calibration strategies
//!
//! A [`Calibrator`] maps a raw probability row from the engine to a
//! calibrated row of the same length that sums to one. The strategy is
//! resolved once per head by [`CalibratorFactory`]; per-call code only
//! matches on the closed enum.
//!
//! - **Identity**: passthrough, reported as uncalibrated
//! - **Temperature**: `softmax(ln(p) / T)`; `T > 1` flattens, `T < 1` sharpens
//! - **Platt**: `sigmoid(a * logit(p1) + b)` over binary outputs

use crate::config::CalibrationSpec;
use polyhead_core::{Error, Result};
use std::fmt;

/// Clamp for log/division of probabilities at or near zero
pub const EPSILON: f64 = 1e-10;

/// Resolved calibration strategy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Calibrator {
    #[default]
    Identity,
    Temperature { temperature: f64 },
    Platt { a: f64, b: f64 },
}

impl Calibrator {
    /// Calibrate a raw probability row
    pub fn calibrate(&self, raw: &[f64]) -> Result<Vec<f64>> {
        match *self {
            Self::Identity => Ok(raw.to_vec()),
            Self::Temperature { temperature } => Ok(temperature_scale(raw, temperature)),
            Self::Platt { a, b } => platt_scale(raw, a, b),
        }
    }

    /// Whether this calibrator leaves probabilities untouched
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Lowercase kind tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Temperature { .. } => "temperature",
            Self::Platt { .. } => "platt",
        }
    }
}

impl fmt::Display for Calibrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Temperature { temperature } => write!(f, "temperature(T={})", temperature),
            Self::Platt { a, b } => write!(f, "platt(a={}, b={})", a, b),
        }
    }
}

fn temperature_scale(raw: &[f64], temperature: f64) -> Vec<f64> {
    // exact passthrough, no log/exp round trip
    if temperature == 1.0 {
        return raw.to_vec();
    }

    let logits: Vec<f64> = raw
        .iter()
        .map(|&p| p.max(EPSILON).ln() / temperature)
        .collect();

    softmax(&logits)
}

fn platt_scale(raw: &[f64], a: f64, b: f64) -> Result<Vec<f64>> {
    if raw.len() != 2 {
        return Err(Error::validation(format!(
            "Platt scaling only supports binary classification, got {} classes",
            raw.len()
        )));
    }

    // p1 = 0 would give ln(0) = -inf, and 0 * -inf is NaN when a = 0
    let positive = raw[1].clamp(EPSILON, 1.0);
    let logit = (positive / (1.0 - positive + EPSILON)).ln();
    let calibrated = sigmoid(a * logit + b);

    Ok(vec![1.0 - calibrated, calibrated])
}

/// Numerically stable softmax: the max logit is subtracted before `exp`
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Resolves calibration specs into strategies at construction time
pub struct CalibratorFactory;

impl CalibratorFactory {
    /// Resolve a spec; `None` resolves to identity.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown kind or an unusable
    /// temperature. Never deferred to call time.
    pub fn create(spec: Option<&CalibrationSpec>) -> Result<Calibrator> {
        let Some(spec) = spec else {
            return Ok(Calibrator::Identity);
        };

        match spec.kind().to_ascii_lowercase().as_str() {
            "identity" | "none" => Ok(Calibrator::Identity),
            "temperature" => {
                let temperature = spec.parameter_or("temperature", 1.0);
                if !temperature.is_finite() || temperature <= 0.0 {
                    return Err(Error::config(format!(
                        "temperature must be positive and finite, got {}",
                        temperature
                    )));
                }
                Ok(Calibrator::Temperature { temperature })
            }
            "platt" => {
                let a = spec.parameter_or("a", 1.0);
                let b = spec.parameter_or("b", 0.0);
                if !a.is_finite() || !b.is_finite() {
                    return Err(Error::config("Platt parameters must be finite"));
                }
                Ok(Calibrator::Platt { a, b })
            }
            _ => Err(Error::config(format!(
                "Unsupported calibration type: {}",
                spec.kind()
            ))),
        }
    }
}
