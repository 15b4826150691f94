//! Decision outcome and the persisted decision record

use crate::explanation::truncate_explanation;
use crate::types::transaction::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binary fraud verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Fraud,
    Safe,
}

impl Verdict {
    pub fn is_fraud(&self) -> bool {
        matches!(self, Verdict::Fraud)
    }
}

/// What the caller gets back for one scored transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Model probability of fraud (0.0 - 1.0)
    pub fraud_probability: f64,
    /// `true` when the probability reached the threshold
    pub fraud_verdict: bool,
    /// Rule-based justification, untruncated
    pub explanation: String,
}

impl Decision {
    pub fn verdict(&self) -> Verdict {
        if self.fraud_verdict {
            Verdict::Fraud
        } else {
            Verdict::Safe
        }
    }
}

/// Immutable record of one scored transaction, handed to the decision log.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub decision_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub features: FeatureVector,
    pub fraud_probability: f64,
    pub verdict: Verdict,
    /// Explanation truncated for storage
    pub explanation: String,
}

impl DecisionRecord {
    /// Build the record for a computed decision, stamped with the current time.
    pub fn new(features: FeatureVector, decision: &Decision) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            created_at: Utc::now(),
            features,
            fraud_probability: decision.fraud_probability,
            verdict: decision.verdict(),
            explanation: truncate_explanation(&decision.explanation),
        }
    }
}

/// A decision record read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDecision {
    pub id: i64,
    pub decision_id: String,
    pub created_at: DateTime<Utc>,
    pub amount: f64,
    pub txn_type: String,
    pub channel: String,
    pub fraud_probability: f64,
    pub fraud_prediction: bool,
    pub reason_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explanation::MAX_EXPLANATION_CHARS;
    use crate::types::transaction::fixtures::safe_vector;

    #[test]
    fn test_record_truncates_explanation() {
        let decision = Decision {
            fraud_probability: 0.9,
            fraud_verdict: true,
            explanation: "x".repeat(400),
        };

        let record = DecisionRecord::new(safe_vector(), &decision);

        assert_eq!(record.explanation.chars().count(), MAX_EXPLANATION_CHARS);
        assert_eq!(record.verdict, Verdict::Fraud);
        // caller-facing text stays whole
        assert_eq!(decision.explanation.len(), 400);
    }

    #[test]
    fn test_decision_serialization() {
        let decision = Decision {
            fraud_probability: 0.12,
            fraud_verdict: false,
            explanation: "ok".to_string(),
        };

        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["fraud_verdict"], false);
        assert_eq!(json["fraud_probability"], 0.12);
        assert_eq!(decision.verdict(), Verdict::Safe);
    }
}
