//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestration core. Console
//! output is human readable in development and JSON when requested, so the
//! same events can be shipped to a log pipeline in production.

use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console = if json_requested() {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("SBOM_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn json_requested() -> bool {
    std::env::var("SBOM_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for request operations
pub fn log_request_operation(operation: &str, request_id: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        request_id = %request_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "REQUEST_OPERATION"
    );
}

/// Log structured data for generation operations
pub fn log_generation_operation(
    operation: &str,
    generation_id: &str,
    request_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        generation_id = %generation_id,
        request_id = request_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "GENERATION_OPERATION"
    );
}

/// Log structured data for enhancement operations
pub fn log_enhancement_operation(
    operation: &str,
    enhancement_id: &str,
    generation_id: Option<&str>,
    index: u32,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        enhancement_id = %enhancement_id,
        generation_id = generation_id,
        index = index,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ENHANCEMENT_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_per_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
