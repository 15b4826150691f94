//! Rule-based explanation of a verdict.
//!
//! Independent of the model: the same four risk factors are checked for
//! every transaction, and the verdict only selects which side is reported.

use crate::types::decision::Verdict;
use crate::types::transaction::FeatureVector;

/// Storage limit for explanation text, in characters.
pub const MAX_EXPLANATION_CHARS: usize = 250;

/// Amount above which a transaction always counts as high value.
const HIGH_AMOUNT_FLOOR: f64 = 50_000.0;
/// Share of the balance a transaction may use before it counts as high value.
const BALANCE_SHARE: f64 = 0.6;
/// Earliest normal hour (inclusive).
const FIRST_NORMAL_HOUR: u8 = 7;
/// Latest normal hour (inclusive).
const LAST_NORMAL_HOUR: u8 = 22;
/// Accounts with fewer past transactions count as low activity.
const MIN_ACCOUNT_TXNS: u32 = 10;

const FRAUD_FALLBACK: &str =
    "This transaction pattern looks unusual compared to typical customer behaviour.";
const SAFE_FALLBACK: &str = "This transaction is consistent with typical customer behaviour.";

/// Fraud-indicating condition checked by the explanation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskFactor {
    HighAmount,
    International,
    UnusualTime,
    LowActivity,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 4] = [
        RiskFactor::HighAmount,
        RiskFactor::International,
        RiskFactor::UnusualTime,
        RiskFactor::LowActivity,
    ];

    /// Whether the fraud-indicating side of this factor holds.
    pub fn triggered(&self, v: &FeatureVector) -> bool {
        match self {
            RiskFactor::HighAmount => {
                v.amount() > (v.balance() * BALANCE_SHARE).max(HIGH_AMOUNT_FLOOR)
            }
            RiskFactor::International => v.is_international(),
            RiskFactor::UnusualTime => {
                v.is_weekend() || v.hour() < FIRST_NORMAL_HOUR || v.hour() > LAST_NORMAL_HOUR
            }
            RiskFactor::LowActivity => v.txns_per_account() < MIN_ACCOUNT_TXNS,
        }
    }

    pub fn fraud_reason(&self) -> &'static str {
        match self {
            RiskFactor::HighAmount => "high transaction amount compared to balance",
            RiskFactor::International => "international transaction",
            RiskFactor::UnusualTime => "unusual transaction time",
            RiskFactor::LowActivity => "low account activity",
        }
    }

    pub fn safe_reason(&self) -> &'static str {
        match self {
            RiskFactor::HighAmount => "amount is within a normal range",
            RiskFactor::International => "transaction is domestic",
            RiskFactor::UnusualTime => "time of transaction is within normal hours",
            RiskFactor::LowActivity => "account has sufficient past activity",
        }
    }
}

/// Risk factors triggered by a transaction, in rule order.
pub fn risk_factors(v: &FeatureVector) -> Vec<RiskFactor> {
    RiskFactor::ALL
        .iter()
        .copied()
        .filter(|f| f.triggered(v))
        .collect()
}

/// Explain a verdict from the transaction's own features.
pub fn explain(v: &FeatureVector, verdict: Verdict) -> String {
    match verdict {
        Verdict::Fraud => {
            let reasons: Vec<&str> = RiskFactor::ALL
                .iter()
                .filter(|f| f.triggered(v))
                .map(|f| f.fraud_reason())
                .collect();

            if reasons.is_empty() {
                FRAUD_FALLBACK.to_string()
            } else {
                format!(
                    "This transaction is flagged as FRAUD because of {}.",
                    reasons.join(", ")
                )
            }
        }
        Verdict::Safe => {
            let reasons: Vec<&str> = RiskFactor::ALL
                .iter()
                .filter(|f| !f.triggered(v))
                .map(|f| f.safe_reason())
                .collect();

            if reasons.is_empty() {
                SAFE_FALLBACK.to_string()
            } else {
                format!(
                    "This transaction is considered SAFE because {}.",
                    reasons.join(", ")
                )
            }
        }
    }
}

/// Cut text to the storage limit on a character boundary.
pub fn truncate_explanation(text: &str) -> String {
    match text.char_indices().nth(MAX_EXPLANATION_CHARS) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
