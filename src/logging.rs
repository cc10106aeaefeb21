//! # Structured Logging Module
//!
//! Environment-aware structured logging: human-readable console output in
//! development, JSON in production. Also hosts the crate's error reporter —
//! the single place non-ignorable sync failures are surfaced.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Use try_init to avoid panic if an embedder already set a subscriber
        let already_set = if environment == "production" {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).json().with_filter(filter))
                .try_init()
                .is_err()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_filter(filter))
                .try_init()
                .is_err()
        };

        if already_set {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("VNODE_APPROVER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Report a non-ignorable sync failure. Ignorable failures never come through
/// here; they are logged quietly at the call site.
pub fn report_sync_error(controller: &str, key: &str, error: &dyn std::error::Error) {
    tracing::error!(
        controller = %controller,
        key = %key,
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ SYNC_ERROR"
    );
}

/// Log a durably recorded approval.
pub fn log_approval(csr_name: &str, subresource: &str, message: &str) {
    tracing::info!(
        csr = %csr_name,
        subresource = %subresource,
        message = %message,
        timestamp = %Utc::now().to_rfc3339(),
        "✅ CSR_APPROVED"
    );
}
