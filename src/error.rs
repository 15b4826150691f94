//! Error taxonomy for the decision pipeline
//!
//! Only [`ValidationError`] and [`ScoringError`] abort a request.
//! [`LoggingError`] is recovered inside the pipeline and never reaches the caller.

use thiserror::Error;

/// A feature value failed its declared constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    #[error("unknown {field} '{value}'")]
    UnknownCategory { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("invalid flag value for {field}: '{value}'")]
    InvalidFlag { field: &'static str, value: String },

    #[error("malformed request: {0}")]
    Malformed(String),
}

/// The scorer could not produce a probability for a well-formed vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("model requires feature '{0}' which the transaction does not provide")]
    MissingFeature(String),

    #[error("value '{value}' of feature '{feature}' is outside the model vocabulary")]
    UnknownCategory { feature: String, value: String },

    #[error("model returned an invalid probability: {0}")]
    InvalidProbability(f64),

    #[error("model backend failure: {0}")]
    Backend(String),
}

/// Persisting a decision record failed after the decision was computed.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("decision log unavailable: {0}")]
    Unavailable(String),
}

/// Request-level failure returned by the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

pub type DecisionResult<T> = Result<T, DecisionError>;
