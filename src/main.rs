//! Fraud Decision Service - Main Entry Point
//!
//! Loads the model bundle once, then serves scoring requests over HTTP and,
//! optionally, NATS request/reply.

use anyhow::{Context, Result};
use fraud_decision_service::{
    api::{create_router, AppState},
    config::{AppConfig, LoggingConfig},
    consumer::TransactionConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{ModelLoader, OnnxScorer},
    DecisionPipeline, SqliteDecisionLog, Threshold,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "fraud_decision_service={},tower_http=info",
            logging.level
        ))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("FRAUD_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;

    init_tracing(&config.logging)?;
    info!(config = %config_path, "Starting Fraud Decision Service");

    // Model bundle: classifier plus tuned threshold
    let loader = ModelLoader::with_threads(config.model.onnx_threads)?;
    let bundle = loader.load_bundle(&config.model.model_path, &config.model.info_path)?;
    let scorer = OnnxScorer::new(bundle);

    let threshold = Threshold::new(
        config
            .detection
            .threshold
            .unwrap_or_else(|| scorer.model_threshold()),
    )?;
    info!(
        threshold = %threshold,
        features = scorer.feature_count(),
        overridden = config.detection.threshold.is_some(),
        "Scorer ready"
    );

    if let Some(dir) = Path::new(&config.storage.database_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let store = Arc::new(
        SqliteDecisionLog::open(&config.storage.database_path)
            .context("Failed to open decision log")?,
    );
    info!(path = %config.storage.database_path, "Decision log opened");

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Arc::new(DecisionPipeline::new(
        Arc::new(scorer),
        threshold,
        store.clone(),
        metrics.clone(),
    ));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    if config.nats.enabled {
        let client = async_nats::connect(&config.nats.url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
        info!(url = %config.nats.url, "Connected to NATS");

        let consumer = TransactionConsumer::new(client, &config.nats.request_subject);
        let pipeline = pipeline.clone();
        let workers = config.pipeline.workers;
        tokio::spawn(async move {
            if let Err(e) = consumer.run(pipeline, workers).await {
                error!(error = %e, "NATS intake stopped");
            }
        });
    }

    let app = create_router(AppState {
        pipeline,
        store,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.http_addr))?;
    info!(addr = %config.server.http_addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
