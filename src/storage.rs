//! Decision log persistence.
//!
//! Only this module talks to the database. The pipeline sees the
//! [`DecisionLog`] capability and nothing else.

use crate::error::LoggingError;
use crate::types::decision::{DecisionRecord, StoredDecision};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Append-only sink for decision records.
pub trait DecisionLog: Send + Sync {
    /// Persist one record. Each append is atomic with respect to others.
    fn append(&self, record: DecisionRecord) -> Result<(), LoggingError>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fraud_predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    decision_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    amount REAL NOT NULL,
    balance REAL NOT NULL,
    hour INTEGER NOT NULL,
    day_of_week INTEGER NOT NULL,
    is_weekend INTEGER NOT NULL,
    is_international_flag INTEGER NOT NULL,
    age INTEGER NOT NULL,
    txns_per_account INTEGER NOT NULL,
    avg_amount_account REAL NOT NULL,
    txn_type TEXT NOT NULL,
    channel TEXT NOT NULL,
    account_type TEXT NOT NULL,
    gender TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    fraud_probability REAL NOT NULL,
    fraud_prediction INTEGER NOT NULL,
    reason_text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fraud_predictions_created ON fraud_predictions(created_at);
"#;

/// SQLite-backed decision log
pub struct SqliteDecisionLog {
    conn: Mutex<Connection>,
}

impl SqliteDecisionLog {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoggingError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.migrate()?;
        Ok(log)
    }

    /// In-memory database, used in tests.
    pub fn in_memory() -> Result<Self, LoggingError> {
        let log = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        log.migrate()?;
        Ok(log)
    }

    pub fn migrate(&self) -> Result<(), LoggingError> {
        self.lock()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Most recent decisions, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredDecision>, LoggingError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, decision_id, created_at, amount, txn_type, channel,
                    fraud_probability, fraud_prediction, reason_text
             FROM fraud_predictions ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(StoredDecision {
                    id: row.get(0)?,
                    decision_id: row.get(1)?,
                    created_at: row.get::<_, DateTime<Utc>>(2)?,
                    amount: row.get(3)?,
                    txn_type: row.get(4)?,
                    channel: row.get(5)?,
                    fraud_probability: row.get(6)?,
                    fraud_prediction: row.get(7)?,
                    reason_text: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn count(&self) -> Result<u64, LoggingError> {
        let n: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM fraud_predictions", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LoggingError> {
        self.conn
            .lock()
            .map_err(|e| LoggingError::Unavailable(format!("connection lock poisoned: {}", e)))
    }
}

impl DecisionLog for SqliteDecisionLog {
    fn append(&self, record: DecisionRecord) -> Result<(), LoggingError> {
        let f = &record.features;
        self.lock()?.execute(
            "INSERT INTO fraud_predictions (
                decision_id, created_at,
                amount, balance, hour, day_of_week,
                is_weekend, is_international_flag, age,
                txns_per_account, avg_amount_account,
                txn_type, channel, account_type, gender,
                city, state,
                fraud_probability, fraud_prediction, reason_text
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
            )",
            params![
                record.decision_id.to_string(),
                record.created_at,
                f.amount(),
                f.balance(),
                f.hour(),
                f.day_of_week(),
                f.is_weekend(),
                f.is_international(),
                f.age(),
                f.txns_per_account(),
                f.avg_amount_account(),
                f.txn_type().as_str(),
                f.channel().as_str(),
                f.account_type().as_str(),
                f.gender(),
                f.city(),
                f.state(),
                record.fraud_probability,
                record.verdict.is_fraud(),
                record.explanation,
            ],
        )?;

        debug!(decision_id = %record.decision_id, "Decision record stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decision::Decision;
    use crate::types::transaction::fixtures::{safe_vector, suspicious_vector};

    fn record(fraud: bool, explanation: &str) -> DecisionRecord {
        let features = if fraud {
            suspicious_vector()
        } else {
            safe_vector()
        };
        DecisionRecord::new(
            features,
            &Decision {
                fraud_probability: if fraud { 0.91 } else { 0.07 },
                fraud_verdict: fraud,
                explanation: explanation.to_string(),
            },
        )
    }

    #[test]
    fn test_append_and_read_back() {
        let log = SqliteDecisionLog::in_memory().unwrap();

        log.append(record(false, "safe")).unwrap();
        log.append(record(true, "fraud")).unwrap();

        assert_eq!(log.count().unwrap(), 2);

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].fraud_prediction);
        assert_eq!(recent[0].reason_text, "fraud");
        assert_eq!(recent[0].txn_type, "Online");
        assert!(!recent[1].fraud_prediction);
        assert_eq!(recent[1].amount, 1500.0);
    }

    #[test]
    fn test_recent_respects_limit() {
        let log = SqliteDecisionLog::in_memory().unwrap();
        for _ in 0..5 {
            log.append(record(false, "safe")).unwrap();
        }

        assert_eq!(log.recent(3).unwrap().len(), 3);
    }

    #[test]
    fn test_stored_reason_is_truncated() {
        let log = SqliteDecisionLog::in_memory().unwrap();
        log.append(record(true, &"r".repeat(600))).unwrap();

        let stored = log.recent(1).unwrap();
        assert_eq!(stored[0].reason_text.chars().count(), 250);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.db");

        {
            let log = SqliteDecisionLog::open(&path).unwrap();
            log.append(record(true, "fraud")).unwrap();
        }

        let reopened = SqliteDecisionLog::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
