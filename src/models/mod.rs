//! Scoring capability and the ONNX backend

pub mod inference;
pub mod loader;

pub use inference::OnnxScorer;
pub use loader::{ModelBundle, ModelInfo, ModelLoader};

use crate::error::ScoringError;
use crate::types::transaction::FeatureVector;

/// Maps a transaction to a fraud probability in [0, 1].
///
/// Implementations are loaded once at startup and shared read-only across
/// requests, so they must be safe for concurrent calls.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError>;
}

/// Reject probabilities a well-behaved classifier cannot emit.
pub(crate) fn check_probability(p: f64) -> Result<f64, ScoringError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ScoringError::InvalidProbability(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_probability() {
        assert_eq!(check_probability(0.0), Ok(0.0));
        assert_eq!(check_probability(1.0), Ok(1.0));
        assert!(check_probability(1.01).is_err());
        assert!(check_probability(f64::NAN).is_err());
    }
}
