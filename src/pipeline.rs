//! Decision pipeline: score, decide, explain, then log best-effort.

use crate::decider::{decide, Threshold};
use crate::error::{DecisionError, DecisionResult};
use crate::explanation::{explain, risk_factors};
use crate::metrics::PipelineMetrics;
use crate::models::{check_probability, Scorer};
use crate::storage::DecisionLog;
use crate::types::decision::{Decision, DecisionRecord};
use crate::types::transaction::{FeatureVector, TransactionInput};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Composes scorer, threshold and decision log.
///
/// All collaborators are immutable after construction, so one pipeline is
/// shared by every request.
pub struct DecisionPipeline {
    scorer: Arc<dyn Scorer>,
    threshold: Threshold,
    log: Arc<dyn DecisionLog>,
    metrics: Arc<PipelineMetrics>,
}

impl DecisionPipeline {
    pub fn new(
        scorer: Arc<dyn Scorer>,
        threshold: Threshold,
        log: Arc<dyn DecisionLog>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            scorer,
            threshold,
            log,
            metrics,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Validate a raw payload, then evaluate it.
    pub fn evaluate_input(&self, input: TransactionInput) -> DecisionResult<Decision> {
        let features = FeatureVector::try_from(input).map_err(|e| {
            self.metrics.record_validation_failure();
            debug!(error = %e, "Rejected transaction");
            DecisionError::from(e)
        })?;
        self.evaluate(features)
    }

    /// Score, decide and explain one transaction, then hand the record to
    /// the decision log. A logging failure never changes the result.
    pub fn evaluate(&self, features: FeatureVector) -> DecisionResult<Decision> {
        let start_time = Instant::now();

        let probability = self
            .scorer
            .score(&features)
            .and_then(check_probability)
            .map_err(|e| {
                self.metrics.record_scoring_failure();
                warn!(error = %e, "Scoring failed");
                DecisionError::from(e)
            })?;

        let verdict = decide(probability, self.threshold);
        let decision = Decision {
            fraud_probability: probability,
            fraud_verdict: verdict.is_fraud(),
            explanation: explain(&features, verdict),
        };

        let factors = risk_factors(&features);
        let record = DecisionRecord::new(features, &decision);
        let decision_id = record.decision_id;

        if let Err(e) = self.log.append(record) {
            self.metrics.record_logging_failure();
            warn!(
                decision_id = %decision_id,
                error = %e,
                "Failed to log decision"
            );
        }

        let processing_time = start_time.elapsed();
        self.metrics
            .record_decision(processing_time, probability, verdict.is_fraud());

        if verdict.is_fraud() {
            info!(
                decision_id = %decision_id,
                fraud_probability = probability,
                threshold = self.threshold.value(),
                risk_factors = ?factors,
                processing_time_us = processing_time.as_micros(),
                "Transaction flagged as fraud"
            );
        } else {
            debug!(
                decision_id = %decision_id,
                fraud_probability = probability,
                processing_time_us = processing_time.as_micros(),
                "Transaction considered safe"
            );
        }

        Ok(decision)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::{LoggingError, ScoringError};
    use std::sync::Mutex;

    /// Returns the same probability for every transaction.
    pub struct FixedScorer(pub f64);

    impl Scorer for FixedScorer {
        fn score(&self, _: &FeatureVector) -> Result<f64, ScoringError> {
            Ok(self.0)
        }
    }

    pub struct FailingScorer;

    impl Scorer for FailingScorer {
        fn score(&self, _: &FeatureVector) -> Result<f64, ScoringError> {
            Err(ScoringError::MissingFeature("merchant_risk".to_string()))
        }
    }

    #[derive(Default)]
    pub struct MemoryLog {
        pub records: Mutex<Vec<DecisionRecord>>,
    }

    impl DecisionLog for MemoryLog {
        fn append(&self, record: DecisionRecord) -> Result<(), LoggingError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    pub struct BrokenLog;

    impl DecisionLog for BrokenLog {
        fn append(&self, _: DecisionRecord) -> Result<(), LoggingError> {
            Err(LoggingError::Unavailable("database is down".to_string()))
        }
    }

    pub fn pipeline(scorer: impl Scorer + 'static, log: Arc<dyn DecisionLog>) -> DecisionPipeline {
        DecisionPipeline::new(
            Arc::new(scorer),
            Threshold::new(0.5).unwrap(),
            log,
            Arc::new(PipelineMetrics::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::{ScoringError, ValidationError};
    use crate::types::decision::Verdict;
    use crate::types::transaction::fixtures::{safe_input, safe_vector, suspicious_vector};

    #[test]
    fn test_safe_transaction() {
        let log = Arc::new(MemoryLog::default());
        let pipeline = pipeline(FixedScorer(0.08), log.clone());

        let decision = pipeline.evaluate(safe_vector()).unwrap();

        assert!(!decision.fraud_verdict);
        assert_eq!(decision.fraud_probability, 0.08);
        for clause in [
            "amount is within a normal range",
            "transaction is domestic",
            "time of transaction is within normal hours",
            "account has sufficient past activity",
        ] {
            assert!(decision.explanation.contains(clause), "missing '{}'", clause);
        }

        let records = log.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].verdict, Verdict::Safe);
        assert_eq!(records[0].explanation, decision.explanation);
    }

    #[test]
    fn test_fraud_transaction_lists_all_reasons() {
        let pipeline = pipeline(FixedScorer(0.93), Arc::new(MemoryLog::default()));

        let decision = pipeline.evaluate(suspicious_vector()).unwrap();

        assert!(decision.fraud_verdict);
        assert!(decision
            .explanation
            .starts_with("This transaction is flagged as FRAUD because of "));
        for reason in [
            "high transaction amount compared to balance",
            "international transaction",
            "unusual transaction time",
            "low account activity",
        ] {
            assert!(decision.explanation.contains(reason));
        }
    }

    #[test]
    fn test_probability_at_threshold_is_fraud() {
        let pipeline = pipeline(FixedScorer(0.5), Arc::new(MemoryLog::default()));

        let decision = pipeline.evaluate(safe_vector()).unwrap();

        assert!(decision.fraud_verdict);
    }

    #[test]
    fn test_logging_failure_does_not_change_decision() {
        let healthy = pipeline(FixedScorer(0.93), Arc::new(MemoryLog::default()));
        let degraded = pipeline(FixedScorer(0.93), Arc::new(BrokenLog));

        let expected = healthy.evaluate(suspicious_vector()).unwrap();
        let decision = degraded.evaluate(suspicious_vector()).unwrap();

        assert_eq!(decision, expected);
        assert_eq!(degraded.metrics().snapshot().logging_failures, 1);
        assert_eq!(degraded.metrics().snapshot().evaluated, 1);
    }

    #[test]
    fn test_scoring_failure_aborts_without_logging() {
        let log = Arc::new(MemoryLog::default());
        let pipeline = pipeline(FailingScorer, log.clone());

        let err = pipeline.evaluate(safe_vector()).unwrap_err();

        assert!(matches!(
            err,
            DecisionError::Scoring(ScoringError::MissingFeature(_))
        ));
        assert!(log.records.lock().unwrap().is_empty());
        assert_eq!(pipeline.metrics().snapshot().scoring_failures, 1);
    }

    #[test]
    fn test_out_of_range_probability_is_scoring_error() {
        for bad in [f64::NAN, 1.7, -0.1] {
            let log = Arc::new(MemoryLog::default());
            let pipeline = pipeline(FixedScorer(bad), log.clone());

            let err = pipeline.evaluate(suspicious_vector()).unwrap_err();

            assert!(
                matches!(
                    err,
                    DecisionError::Scoring(ScoringError::InvalidProbability(_))
                ),
                "accepted {}",
                bad
            );
            assert!(log.records.lock().unwrap().is_empty());
            assert_eq!(pipeline.metrics().snapshot().scoring_failures, 1);
            assert_eq!(pipeline.metrics().snapshot().evaluated, 0);
        }
    }

    #[test]
    fn test_invalid_input_rejected_before_scoring() {
        let log = Arc::new(MemoryLog::default());
        let pipeline = pipeline(FailingScorer, log.clone());
        let mut input = safe_input();
        input.hour = 25;

        let err = pipeline.evaluate_input(input).unwrap_err();

        assert!(matches!(
            err,
            DecisionError::Validation(ValidationError::OutOfRange { field: "hour", .. })
        ));
        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.validation_failures, 1);
        assert_eq!(snapshot.scoring_failures, 0);
        assert!(log.records.lock().unwrap().is_empty());
    }
}
