//! Type definitions for the decision pipeline

pub mod decision;
pub mod transaction;

pub use decision::{Decision, DecisionRecord, StoredDecision, Verdict};
pub use transaction::{AccountType, Channel, FeatureVector, FlagValue, TransactionInput, TxnType};
