use crate::pipeline::PipelineConfig;
use crate::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use ja3_gaffer::GafferConfig;
use ja3_nats::ConsumerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream holding windowed JA3 observations
    #[serde(default = "default_input_stream")]
    pub input_stream: String,

    /// Subject filter for the input consumer
    #[serde(default = "default_input_subject")]
    pub input_subject: String,

    /// Durable consumer name
    #[serde(default = "default_input_consumer")]
    pub input_consumer: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Gaffer configuration
    /// Gaffer REST base URL; unset or empty runs in transform-only mode
    #[serde(default)]
    pub gaffer_url: Option<String>,

    /// Gaffer HTTP request timeout in seconds
    #[serde(default = "default_gaffer_timeout_secs")]
    pub gaffer_timeout_secs: u64,

    // Pipeline configuration
    /// Capacity of the hand-off queue between consumer and workers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of worker tasks
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Batches that may wait for the submission writer
    #[serde(default = "default_submission_depth")]
    pub submission_depth: usize,

    /// Time allowed for draining and cleanup on shutdown, in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_input_stream() -> String {
    "ja3-window".to_string()
}

fn default_input_subject() -> String {
    "ja3-window.key".to_string()
}

fn default_input_consumer() -> String {
    "worker-ja3-loader-in".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_gaffer_timeout_secs() -> u64 {
    30
}

// Pipeline defaults
fn default_queue_capacity() -> usize {
    50
}

fn default_worker_count() -> usize {
    5
}

fn default_submission_depth() -> usize {
    1
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("JA3"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("queue_capacity", self.queue_capacity),
            ("worker_count", self.worker_count),
            ("submission_depth", self.submission_depth),
            ("nats_batch_size", self.nats_batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Message(format!("{name} must be at least 1")));
            }
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::Message(format!(
                "log_format must be json or pretty, got {}",
                self.log_format
            )));
        }

        Ok(())
    }

    /// Gaffer client settings, or `None` in transform-only mode.
    pub fn gaffer_config(&self) -> Option<GafferConfig> {
        self.gaffer_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| GafferConfig::new(url, Duration::from_secs(self.gaffer_timeout_secs)))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.queue_capacity,
            workers: self.worker_count,
            submission_depth: self.submission_depth,
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            stream: self.input_stream.clone(),
            consumer_name: self.input_consumer.clone(),
            subject_filter: self.input_subject.clone(),
            batch_size: self.nats_batch_size,
            max_wait: Duration::from_secs(self.nats_batch_wait_secs),
        }
    }
}
