//! Configuration management for the decision service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub nats: NatsConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    pub http_addr: String,
}

/// NATS intake configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// Serve scoring requests over NATS as well as HTTP
    #[serde(default)]
    pub enabled: bool,
    /// NATS server URL
    pub url: String,
    /// Subject scoring requests arrive on
    pub request_subject: String,
}

/// Model bundle location
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// ONNX classifier file
    pub model_path: String,
    /// Training sidecar with threshold and input layout
    pub info_path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Detection configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionConfig {
    /// Overrides the threshold shipped with the model bundle
    pub threshold: Option<f64>,
}

/// Decision log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: String,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent NATS requests in flight
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path; `FRAUD__SECTION__KEY`
    /// environment variables take precedence over the file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FRAUD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                http_addr: "0.0.0.0:8000".to_string(),
            },
            nats: NatsConfig {
                enabled: false,
                url: "nats://localhost:4222".to_string(),
                request_subject: "transactions.score".to_string(),
            },
            model: ModelConfig {
                model_path: "models/fraud_rf_pipeline.onnx".to_string(),
                info_path: "models/model_info.json".to_string(),
                onnx_threads: 1,
            },
            detection: DetectionConfig::default(),
            storage: StorageConfig {
                database_path: "data/fraud_predictions.db".to_string(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.http_addr, "0.0.0.0:8000");
        assert!(!config.nats.enabled);
        assert!(config.detection.threshold.is_none());
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[server]
http_addr = "127.0.0.1:9000"

[nats]
url = "nats://nats:4222"
request_subject = "tx.score"

[model]
model_path = "m.onnx"
info_path = "m.json"

[detection]
threshold = 0.35

[storage]
database_path = ":memory:"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:9000");
        assert!(!config.nats.enabled);
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.detection.threshold, Some(0.35));
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
        assert_eq!(config.logging.format, "json");
    }
}
