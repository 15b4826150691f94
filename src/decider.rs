//! Probability-to-verdict thresholding

use crate::types::decision::Verdict;
use anyhow::{ensure, Result};
use std::fmt;

/// Fraud probability cutoff, fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    /// Create a threshold; must lie in [0, 1].
    pub fn new(value: f64) -> Result<Self> {
        ensure!(
            value.is_finite() && (0.0..=1.0).contains(&value),
            "threshold must be within [0, 1], got {}",
            value
        );
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Fraud iff `probability >= threshold`. The boundary counts as fraud.
pub fn decide(probability: f64, threshold: Threshold) -> Verdict {
    if probability >= threshold.value() {
        Verdict::Fraud
    } else {
        Verdict::Safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_fraud() {
        let t = Threshold::new(0.5).unwrap();

        assert_eq!(decide(0.5, t), Verdict::Fraud);
        assert_eq!(decide(0.5 - f64::EPSILON, t), Verdict::Safe);
        assert_eq!(decide(0.99, t), Verdict::Fraud);
        assert_eq!(decide(0.0, t), Verdict::Safe);
    }

    #[test]
    fn test_extreme_thresholds() {
        let zero = Threshold::new(0.0).unwrap();
        let one = Threshold::new(1.0).unwrap();

        assert_eq!(decide(0.0, zero), Verdict::Fraud);
        assert_eq!(decide(0.999, one), Verdict::Safe);
        assert_eq!(decide(1.0, one), Verdict::Fraud);
    }

    #[test]
    fn test_threshold_must_be_probability() {
        assert!(Threshold::new(-0.1).is_err());
        assert!(Threshold::new(1.5).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert_eq!(Threshold::new(0.61).unwrap().value(), 0.61);
    }

    #[test]
    fn test_sweep_matches_comparison() {
        let t = Threshold::new(0.37).unwrap();
        for i in 0..=100 {
            let p = i as f64 / 100.0;
            assert_eq!(decide(p, t).is_fraud(), p >= 0.37);
        }
    }
}
