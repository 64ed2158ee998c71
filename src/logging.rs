//! # Structured Logging Module
//!
//! Environment-aware structured logging for tracing messages through their
//! phase chains. Console output is human readable by default and switches to
//! JSON lines when `logging.json` is set.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Subsequent calls are no-ops.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = if config.level.trim().is_empty() {
            get_log_level(&environment)
        } else {
            config.level.clone()
        };

        let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

        let console = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
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

        // A host application may already own the global subscriber
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
pub fn get_environment() -> String {
    std::env::var("PHASE_ENGINE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default log level for an environment when none is configured
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "info".to_string(),
    }
}

/// Log a flow lifecycle operation with structured data
pub fn log_flow_operation(
    operation: &str,
    message_id: &str,
    flow: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        message_id = %message_id,
        flow = %flow,
        status = %status,
        details = details.unwrap_or(""),
        timestamp = %Utc::now().to_rfc3339(),
        "🔀 FLOW: {operation}"
    );
}

/// Log a handler invocation at debug level
pub fn log_handler_invocation(phase: &str, handler: &str, message_id: &str) {
    tracing::debug!(
        phase = %phase,
        handler = %handler,
        message_id = %message_id,
        "🧩 HANDLER: invoking {handler}"
    );
}

/// Log errors with structured context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context.unwrap_or(""),
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR: {component} {operation} failed"
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
        assert_eq!(get_log_level("staging"), "info");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init_structured_logging(&config);
        init_structured_logging(&config);
        log_flow_operation("receive", "m-1", "in", "completed", None);
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
