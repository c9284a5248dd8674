//! # Structured Logging Module
//!
//! Environment-aware structured logging for tracing actor coordination:
//! vote rounds, barrier drains and job lifecycle.

use crate::actors::{Address, Phase};
use crate::config::LoggingConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    init_with_config(&LoggingConfig::default());
}

/// Initialize structured logging once. `RUST_LOG` wins over the configured
/// level, which wins over the environment default.
pub fn init_with_config(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            level = %log_level,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TRAVERSAL_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a completed vote round at the master
pub fn log_round(round: u64, barriers: usize, balance: i64) {
    tracing::info!(
        round = round,
        barriers = barriers,
        balance = balance,
        timestamp = %Utc::now().to_rfc3339(),
        "🗳️ VOTE_ROUND"
    );
}

/// Log a token as it leaves (or reaches) an actor. Runs on every token hop,
/// so fields are formatted only when the event is enabled.
pub fn log_vote(actor: &Address, phase: Phase, balance: i64) {
    tracing::debug!(
        actor = %actor,
        phase = %phase,
        balance = balance,
        "🔁 VOTE_TOKEN"
    );
}

/// Log a job lifecycle event
pub fn log_job(job_id: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        job_id = %job_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 JOB"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_initialization_is_idempotent() {
        init_structured_logging();
        init_with_config(&LoggingConfig {
            level: Some("warn".to_string()),
            json: true,
        });
        log_round(1, 0, 0);
        log_vote(&Address::worker("worker-0"), Phase::Yes, 0);
    }
}
