//! Fraud Decision Service Library
//!
//! Scores a single banking transaction for fraud risk, explains the verdict
//! with deterministic rules, and records every decision.

pub mod api;
pub mod config;
pub mod consumer;
pub mod decider;
pub mod error;
pub mod explanation;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use decider::{decide, Threshold};
pub use error::{DecisionError, LoggingError, ScoringError, ValidationError};
pub use explanation::explain;
pub use models::{OnnxScorer, Scorer};
pub use pipeline::DecisionPipeline;
pub use storage::{DecisionLog, SqliteDecisionLog};
pub use types::{Decision, DecisionRecord, FeatureVector, TransactionInput, Verdict};
