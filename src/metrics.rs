//! Operational counters and latency statistics for the decision pipeline.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by every request
pub struct PipelineMetrics {
    evaluated: AtomicU64,
    fraud_verdicts: AtomicU64,
    validation_failures: AtomicU64,
    scoring_failures: AtomicU64,
    logging_failures: AtomicU64,
    /// Evaluation times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            evaluated: AtomicU64::new(0),
            fraud_verdicts: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            scoring_failures: AtomicU64::new(0),
            logging_failures: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed decision
    pub fn record_decision(&self, processing_time: Duration, probability: f64, fraud: bool) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
        if fraud {
            self.fraud_verdicts.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = ((probability * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scoring_failure(&self) {
        self.scoring_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_logging_failure(&self) {
        self.logging_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Decisions per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.evaluated.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Point-in-time view for the health endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            evaluated: self.evaluated.load(Ordering::Relaxed),
            fraud_verdicts: self.fraud_verdicts.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            scoring_failures: self.scoring_failures.load(Ordering::Relaxed),
            logging_failures: self.logging_failures.load(Ordering::Relaxed),
            throughput: self.get_throughput(),
            processing: self.get_processing_stats(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let s = self.snapshot();
        let fraud_rate = if s.evaluated > 0 {
            (s.fraud_verdicts as f64 / s.evaluated as f64) * 100.0
        } else {
            0.0
        };

        info!(
            evaluated = s.evaluated,
            fraud_verdicts = s.fraud_verdicts,
            fraud_rate = format!("{:.1}%", fraud_rate),
            throughput = format!("{:.1} req/s", s.throughput),
            validation_failures = s.validation_failures,
            scoring_failures = s.scoring_failures,
            logging_failures = s.logging_failures,
            mean_us = s.processing.mean_us,
            p95_us = s.processing.p95_us,
            p99_us = s.processing.p99_us,
            "Decision pipeline summary"
        );

        let dist = self.get_score_distribution();
        let total: u64 = dist.iter().sum();
        if total > 0 {
            let buckets: Vec<String> = dist
                .iter()
                .enumerate()
                .map(|(i, count)| format!("{:.1}-{:.1}:{}", i as f64 / 10.0, (i + 1) as f64 / 10.0, count))
                .collect();
            info!(distribution = %buckets.join(" "), "Fraud probability distribution");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub evaluated: u64,
    pub fraud_verdicts: u64,
    pub validation_failures: u64,
    pub scoring_failures: u64,
    pub logging_failures: u64,
    pub throughput: f64,
    pub processing: ProcessingStats,
}

/// Periodic summary logger
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
