//! Audit logging for CA initialization and certificate issuance.
//!
//! Every operation that touches the CA key emits structured events under the
//! `yubca::audit` target. Events belonging to one operation share a
//! correlation id.
//!
//! # Usage
//!
//! ```rust,ignore
//! use yubca::audit::{self, AuditConfig, LogDestination};
//!
//! audit::init(AuditConfig {
//!     destination: LogDestination::File("/var/log/yubca-audit.json".into()),
//!     ..Default::default()
//! })?;
//! ```
//!
//! # Event Types
//!
//! - `ca.init.attempt` / `ca.init.success` / `ca.init.failure`
//! - `key.generated` - a new CA key was created on the token
//! - `issuance.attempt` / `issuance.success` / `issuance.failure`
//! - `ledger.failure` - a certificate was issued but could not be recorded
//!
//! # JSON Output Example
//!
//! ```json
//! {
//!   "timestamp": "2026-01-04T20:00:00Z",
//!   "level": "INFO",
//!   "target": "yubca::audit",
//!   "event_type": "issuance.success",
//!   "correlation_id": "0b6c2f7e-6a43-4b53-9d0e-51bfa6f0c0f8",
//!   "slot": "9c",
//!   "serial": "8f1d2c...",
//!   "fingerprint": "SHA256:q1w2e3..."
//! }
//! ```

use crate::error::CAError;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

static AUDIT_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Audit log configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Enable audit logging (default: true)
    pub enabled: bool,
    /// Log destination
    pub destination: LogDestination,
    /// Use JSON format (default: true)
    pub json_format: bool,
    /// Log level filter (default: "yubca::audit=info")
    pub filter: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            destination: LogDestination::Stderr,
            json_format: true,
            filter: "yubca::audit=info".to_string(),
        }
    }
}

/// Audit log destination
#[derive(Debug, Clone, Default)]
pub enum LogDestination {
    Stdout,
    #[default]
    Stderr,
    /// Append to a file (path)
    File(String),
}

/// Install the audit subscriber.
///
/// Only the first call has any effect. Fails if the audit file cannot be
/// opened.
pub fn init(config: AuditConfig) -> Result<(), CAError> {
    if AUDIT_INITIALIZED.get().is_some() {
        return Ok(());
    }

    if !config.enabled {
        let _ = AUDIT_INITIALIZED.set(true);
        return Ok(());
    }

    let filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("yubca::audit=info"));

    let installed = match config.destination {
        LogDestination::Stdout => {
            if config.json_format {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(FmtSpan::NONE)
                            .with_writer(std::io::stdout),
                    )
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
                    .try_init()
            }
        }
        LogDestination::Stderr => {
            if config.json_format {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(FmtSpan::NONE)
                            .with_writer(std::io::stderr),
                    )
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                    .try_init()
            }
        }
        LogDestination::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;

            if config.json_format {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(FmtSpan::NONE)
                            .with_writer(std::sync::Mutex::new(file)),
                    )
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_ansi(false)
                            .with_writer(std::sync::Mutex::new(file)),
                    )
                    .try_init()
            }
        }
    };

    if let Err(e) = installed {
        log::warn!("audit subscriber not installed: {}", e);
    }
    let _ = AUDIT_INITIALIZED.set(true);
    Ok(())
}

/// Redact an email address for PII protection.
///
/// Transforms "user@example.com" into "us***@example.com"
pub fn redact_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let local = &email[..at_pos];
        let domain = &email[at_pos..];
        let visible = local.char_indices().nth(2).map_or(local.len(), |(i, _)| i);
        format!("{}***{}", &local[..visible], domain)
    } else {
        "***".to_string()
    }
}

/// Generate a new correlation ID for tracking related audit events.
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Common names that are email addresses are redacted.
fn display_common_name(common_name: &str) -> String {
    if common_name.contains('@') {
        redact_email(common_name)
    } else {
        common_name.to_string()
    }
}

// ============================================================================
// Audit Event Functions
// ============================================================================

pub fn log_init_attempt(correlation_id: &str, slot: &str, algorithm: &str, common_name: &str) {
    tracing::info!(
        target: "yubca::audit",
        event_type = "ca.init.attempt",
        correlation_id = correlation_id,
        slot = slot,
        algorithm = algorithm,
        common_name = %display_common_name(common_name),
        "CA initialization initiated"
    );
}

pub fn log_init_success(correlation_id: &str, slot: &str, serial: &str, fingerprint: &str) {
    tracing::info!(
        target: "yubca::audit",
        event_type = "ca.init.success",
        correlation_id = correlation_id,
        slot = slot,
        serial = serial,
        fingerprint = fingerprint,
        "CA initialization completed successfully"
    );
}

pub fn log_init_failure(correlation_id: &str, slot: &str, error_type: &str, error_message: &str) {
    let safe_message = sanitize_error_message(error_message);

    tracing::warn!(
        target: "yubca::audit",
        event_type = "ca.init.failure",
        correlation_id = correlation_id,
        slot = slot,
        error_type = error_type,
        error_message = %safe_message,
        "CA initialization failed"
    );
}

/// A CA key pair was generated on the token.
pub fn log_key_generation(correlation_id: &str, slot: &str, algorithm: &str, public_key: &str) {
    tracing::info!(
        target: "yubca::audit",
        event_type = "key.generated",
        correlation_id = correlation_id,
        slot = slot,
        algorithm = algorithm,
        public_key = public_key,
        "CA key generated"
    );
}

pub fn log_issuance_attempt(correlation_id: &str, slot: &str, common_name: &str) {
    tracing::info!(
        target: "yubca::audit",
        event_type = "issuance.attempt",
        correlation_id = correlation_id,
        slot = slot,
        common_name = %display_common_name(common_name),
        "Certificate issuance initiated"
    );
}

pub fn log_issuance_success(
    correlation_id: &str,
    slot: &str,
    common_name: &str,
    serial: &str,
    fingerprint: &str,
) {
    tracing::info!(
        target: "yubca::audit",
        event_type = "issuance.success",
        correlation_id = correlation_id,
        slot = slot,
        common_name = %display_common_name(common_name),
        serial = serial,
        fingerprint = fingerprint,
        "Certificate issued"
    );
}

pub fn log_issuance_failure(
    correlation_id: &str,
    slot: &str,
    error_type: &str,
    error_message: &str,
) {
    let safe_message = sanitize_error_message(error_message);

    tracing::warn!(
        target: "yubca::audit",
        event_type = "issuance.failure",
        correlation_id = correlation_id,
        slot = slot,
        error_type = error_type,
        error_message = %safe_message,
        "Certificate issuance failed"
    );
}

/// A certificate was issued but its ledger record was not written.
pub fn log_ledger_failure(correlation_id: &str, serial: &str, error_message: &str) {
    let safe_message = sanitize_error_message(error_message);

    tracing::error!(
        target: "yubca::audit",
        event_type = "ledger.failure",
        correlation_id = correlation_id,
        serial = serial,
        error_message = %safe_message,
        "Issued certificate was not recorded in the ledger"
    );
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Strip token-like words and cap the length of error messages.
fn sanitize_error_message(message: &str) -> String {
    let sanitized = message
        .split_whitespace()
        .map(|word| {
            if word.len() > 40 && word.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
            {
                "[REDACTED]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if sanitized.len() > 500 {
        let cut = (0..=497)
            .rev()
            .find(|i| sanitized.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}...", &sanitized[..cut])
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_email() {
        assert_eq!(redact_email("user@example.com"), "us***@example.com");
        assert_eq!(redact_email("ab@test.org"), "ab***@test.org");
        assert_eq!(redact_email("a@x.com"), "a***@x.com");
        assert_eq!(redact_email("invalid"), "***");
    }

    #[test]
    fn test_display_common_name() {
        assert_eq!(display_common_name("leaf.example.com"), "leaf.example.com");
        assert_eq!(display_common_name("ops@example.com"), "op***@example.com");
    }

    #[test]
    fn test_sanitize_error_message() {
        assert_eq!(
            sanitize_error_message("token error on slot 9c during sign: touch timeout"),
            "token error on slot 9c during sign: touch timeout"
        );

        let with_token = "PIN rejected for 0123456789abcdef0123456789abcdef0123456789abcdef";
        assert!(sanitize_error_message(with_token).contains("[REDACTED]"));

        let long = "x ".repeat(400);
        assert!(sanitize_error_message(&long).len() <= 500);
    }

    #[test]
    fn test_correlation_id_format() {
        let id = new_correlation_id();
        // UUID v4 format: 8-4-4-4-12
        assert_eq!(id.len(), 36);
        assert!(id.chars().filter(|c| *c == '-').count() == 4);
    }

    #[test]
    fn test_events_without_subscriber() {
        let id = new_correlation_id();
        log_init_attempt(&id, "9c", "ec256", "TestCA");
        log_key_generation(&id, "9c", "ec256", "SHA256:abc");
        log_init_failure(&id, "9c", "oracle", "touch timeout");
        log_ledger_failure(&id, "01", "disk full");
    }
}
