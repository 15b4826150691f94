//! Test Transaction Producer
//!
//! Sends generated scoring requests to the service over NATS request/reply
//! and logs the decisions that come back.

use fraud_decision_service::types::{FlagValue, TransactionInput};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

const CITIES: [(&str, &str); 5] = [
    ("Mumbai", "Maharashtra"),
    ("Pune", "Maharashtra"),
    ("Bengaluru", "Karnataka"),
    ("Chennai", "Tamil Nadu"),
    ("Delhi", "Delhi"),
];

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Everyday domestic transaction during business hours
    fn generate_legitimate(&mut self) -> TransactionInput {
        let (city, state) = self.random_choice(&CITIES);
        let day_of_week = self.rng.gen_range(0..5);
        let balance = self.rng.gen_range(5_000.0..200_000.0);

        TransactionInput {
            amount: self.rng.gen_range(100.0..5_000.0),
            balance,
            hour: self.rng.gen_range(8..21),
            day_of_week,
            is_weekend: FlagValue::Int(0),
            is_international_flag: FlagValue::Int(0),
            age: self.rng.gen_range(21..70),
            txns_per_account: self.rng.gen_range(20..400),
            avg_amount_account: self.rng.gen_range(500.0..4_000.0),
            txn_type: self.random_choice(&["ATM", "POS", "Online"]).to_string(),
            channel: self.random_choice(&["Branch", "ATM", "Online", "Mobile"]).to_string(),
            account_type: self.random_choice(&["savings", "current"]).to_string(),
            gender: self.random_choice(&["M", "F"]).to_string(),
            city: city.to_string(),
            state: state.to_string(),
        }
    }

    /// Large overnight international transfer from a thin account
    fn generate_suspicious(&mut self) -> TransactionInput {
        let (city, state) = self.random_choice(&CITIES);

        TransactionInput {
            amount: self.rng.gen_range(60_000.0..150_000.0),
            balance: self.rng.gen_range(1_000.0..20_000.0),
            hour: self.rng.gen_range(0..6),
            day_of_week: self.rng.gen_range(5..7),
            is_weekend: FlagValue::Int(1),
            is_international_flag: FlagValue::Int(1),
            age: self.rng.gen_range(18..30),
            txns_per_account: self.rng.gen_range(0..10),
            avg_amount_account: self.rng.gen_range(500.0..3_000.0),
            txn_type: self.random_choice(&["Online", "Transfer"]).to_string(),
            channel: self.random_choice(&["Online", "Mobile"]).to_string(),
            account_type: self.random_choice(&["current", "credit_card"]).to_string(),
            gender: self.random_choice(&["M", "F"]).to_string(),
            city: city.to_string(),
            state: state.to_string(),
        }
    }

    fn random_choice<T: Copy>(&mut self, choices: &[T]) -> T {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions.score");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let mut flagged = 0u64;

    for i in 0..count {
        let suspicious = rng.gen_bool(fraud_rate);
        let transaction = if suspicious {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&transaction)?;
        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                let decision: serde_json::Value = serde_json::from_slice(&reply.payload)?;
                if decision["fraud_verdict"] == true {
                    flagged += 1;
                }
                info!(
                    request = i + 1,
                    generated_suspicious = suspicious,
                    fraud_probability = %decision["fraud_probability"],
                    explanation = %decision["explanation"],
                    "Decision received"
                );
            }
            Err(e) => warn!(request = i + 1, error = %e, "Request failed"),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Sent {} requests, {} flagged as fraud", count, flagged);

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            let json = serde_json::to_string_pretty(&transaction)?;
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
