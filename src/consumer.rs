//! NATS request/reply intake for transactions

use crate::error::{DecisionError, ValidationError};
use crate::pipeline::DecisionPipeline;
use crate::types::decision::Decision;
use crate::types::transaction::TransactionInput;
use anyhow::Result;
use async_nats::{Client, Message, Subscriber};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Reply body sent back to the requester
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Decision(Decision),
    Error { error: String, kind: &'static str },
}

impl Reply {
    fn from_result(result: Result<Decision, DecisionError>) -> Self {
        match result {
            Ok(decision) => Reply::Decision(decision),
            Err(DecisionError::Validation(e)) => Reply::Error {
                error: e.to_string(),
                kind: "validation",
            },
            Err(DecisionError::Scoring(e)) => Reply::Error {
                error: e.to_string(),
                kind: "scoring",
            },
        }
    }
}

/// Parse and evaluate one message payload.
pub fn handle_payload(pipeline: &DecisionPipeline, payload: &[u8]) -> Reply {
    let result = match serde_json::from_slice::<TransactionInput>(payload) {
        Ok(input) => pipeline.evaluate_input(input),
        Err(e) => {
            pipeline.metrics().record_validation_failure();
            Err(ValidationError::Malformed(e.to_string()).into())
        }
    };
    Reply::from_result(result)
}

/// Consumer answering scoring requests published on a NATS subject
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the request subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    /// Serve requests until the subscription closes, at most `workers` at a time.
    pub async fn run(self, pipeline: Arc<DecisionPipeline>, workers: usize) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut subscription = self.subscribe().await?;

        while let Some(message) = subscription.next().await {
            let permit = semaphore.clone().acquire_owned().await?;
            let pipeline = pipeline.clone();
            let client = self.client.clone();

            tokio::spawn(async move {
                respond(client, pipeline, message).await;
                drop(permit);
            });
        }

        info!(subject = %self.subject, "Transaction subscription closed");
        Ok(())
    }
}

async fn respond(client: Client, pipeline: Arc<DecisionPipeline>, message: Message) {
    let Some(reply_to) = message.reply.clone() else {
        warn!(subject = %message.subject, "Dropping request without reply subject");
        return;
    };

    let payload = message.payload.clone();
    let reply = match tokio::task::spawn_blocking(move || handle_payload(&pipeline, &payload)).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "Evaluation task failed");
            Reply::Error {
                error: "internal error".to_string(),
                kind: "internal",
            }
        }
    };

    let body = match serde_json::to_vec(&reply) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Failed to serialize reply");
            return;
        }
    };

    if let Err(e) = client.publish(reply_to.clone(), body.into()).await {
        error!(reply_to = %reply_to, error = %e, "Failed to publish decision");
    } else {
        debug!(reply_to = %reply_to, "Decision published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{pipeline, FixedScorer, MemoryLog};
    use crate::types::transaction::fixtures::suspicious_input;

    #[test]
    fn test_handle_valid_payload() {
        let pipeline = pipeline(FixedScorer(0.8), Arc::new(MemoryLog::default()));
        let payload = serde_json::to_vec(&suspicious_input()).unwrap();

        let reply = handle_payload(&pipeline, &payload);

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["fraud_verdict"], true);
        assert_eq!(json["fraud_probability"], 0.8);
    }

    #[test]
    fn test_handle_garbage_payload() {
        let pipeline = pipeline(FixedScorer(0.8), Arc::new(MemoryLog::default()));

        let reply = handle_payload(&pipeline, b"not json");

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(pipeline.metrics().snapshot().validation_failures, 1);
    }

    #[test]
    fn test_handle_invalid_values() {
        let pipeline = pipeline(FixedScorer(0.8), Arc::new(MemoryLog::default()));
        let mut input = suspicious_input();
        input.txn_type = "Cheque".to_string();
        let payload = serde_json::to_vec(&input).unwrap();

        let json = serde_json::to_value(handle_payload(&pipeline, &payload)).unwrap();

        assert_eq!(json["kind"], "validation");
        assert_eq!(json["error"], "unknown txn_type 'Cheque'");
    }
}
