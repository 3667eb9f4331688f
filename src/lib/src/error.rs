use crate::platform::Slot;

/// The yubca error type.
#[derive(Debug, thiserror::Error)]
pub enum CAError {
    #[error("invalid configuration field {field}: {message}")]
    InvalidConfiguration {
        field: &'static str,
        message: String,
        help: &'static str,
    },

    #[error("unknown slot type {0:?}")]
    UnknownSlot(String),

    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("invalid validity duration {value:?}: {reason}")]
    InvalidValidity { value: String, reason: String },

    #[error("a certificate authority is already configured on slot {slot}")]
    AlreadyInitialized { slot: Slot },

    #[error("no certificate authority configured on slot {slot}")]
    NotFound { slot: Slot },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("token error on slot {slot} during {operation}: {message}")]
    Oracle {
        slot: Slot,
        operation: &'static str,
        message: String,
    },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("could not read random source: {0}")]
    Entropy(String),

    #[error("certificate encoding error: {0}")]
    Certificate(String),

    #[error("time error: {0}")]
    TimeError(String),

    #[error("usage error: {0}")]
    UsageError(&'static str),

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
}

/// Coarse classification of a [`CAError`], used for exit codes and audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    AlreadyInitialized,
    NotFound,
    Parse,
    Oracle,
    Ledger,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::AlreadyInitialized => "already_initialized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Parse => "parse",
            ErrorKind::Oracle => "oracle",
            ErrorKind::Ledger => "ledger",
            ErrorKind::Internal => "internal",
        }
    }
}

impl CAError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CAError::InvalidConfiguration { .. }
            | CAError::UnknownSlot(_)
            | CAError::UnknownAlgorithm(_)
            | CAError::InvalidValidity { .. } => ErrorKind::Configuration,
            CAError::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
            CAError::NotFound { .. } => ErrorKind::NotFound,
            CAError::Parse(_) => ErrorKind::Parse,
            CAError::Oracle { .. } => ErrorKind::Oracle,
            CAError::Ledger(_) => ErrorKind::Ledger,
            CAError::Entropy(_)
            | CAError::Certificate(_)
            | CAError::TimeError(_)
            | CAError::UsageError(_)
            | CAError::IOError(_) => ErrorKind::Internal,
        }
    }

    /// Builds an [`CAError::Oracle`] for a failed token operation.
    pub fn oracle(slot: Slot, operation: &'static str, message: impl ToString) -> Self {
        CAError::Oracle {
            slot,
            operation,
            message: message.to_string(),
        }
    }
}

impl From<x509_parser::error::X509Error> for CAError {
    fn from(err: x509_parser::error::X509Error) -> Self {
        CAError::Parse(format!("{:?}", err))
    }
}
