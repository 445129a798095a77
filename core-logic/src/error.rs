//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for run-level failures.
///
/// Per-transfer failures never surface here; they are folded into a failed
/// [`TransferResult`](crate::transfer::TransferResult) at the task boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("Failed to persist results to {path}: {msg}")]
    Persist { path: String, msg: String },
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to load configuration from '{path}': {msg}")]
    Load { path: String, msg: String },
}

/// Stage-specific failure of a single transfer.
///
/// Every variant carries a human-readable message which ends up verbatim in
/// the persisted result document. The message text is what the retry
/// classifier inspects, so the wording matters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("invalid private key: {0}")]
    InvalidCredential(String),

    #[error("{0}")]
    InsufficientBalance(String),

    #[error("failed to get nonce: {0}")]
    NonceQuery(String),

    #[error("failed to get gas price: {0}")]
    FeeQuery(String),

    #[error("transfer failed: {0}")]
    Submission(String),

    #[error("receipt error: transaction reverted{}", detail_suffix(.0))]
    Reverted(String),

    #[error("receipt error: {0}")]
    ConfirmationTimeout(String),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({})", detail)
    }
}

impl TransferError {
    /// Stable name of the failure kind, written to the result document.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::InvalidCredential(_) => "InvalidCredentialError",
            TransferError::InsufficientBalance(_) => "InsufficientBalanceError",
            TransferError::NonceQuery(_) => "NonceQueryError",
            TransferError::FeeQuery(_) => "FeeQueryError",
            TransferError::Submission(_) => "SubmissionError",
            TransferError::Reverted(_) => "RevertedError",
            TransferError::ConfirmationTimeout(_) => "ConfirmationTimeoutError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_never_empty() {
        let errors = [
            TransferError::InvalidCredential(String::new()),
            TransferError::InsufficientBalance("insufficient ETH balance".into()),
            TransferError::NonceQuery(String::new()),
            TransferError::FeeQuery(String::new()),
            TransferError::Submission(String::new()),
            TransferError::Reverted(String::new()),
            TransferError::ConfirmationTimeout("timeout waiting for receipt".into()),
        ];
        for e in errors {
            assert!(!e.to_string().is_empty(), "{} rendered empty", e.kind());
        }
    }

    #[test]
    fn test_reverted_detail() {
        assert_eq!(
            TransferError::Reverted(String::new()).to_string(),
            "receipt error: transaction reverted"
        );
        assert_eq!(
            TransferError::Reverted("REVERT".into()).to_string(),
            "receipt error: transaction reverted (REVERT)"
        );
    }
}
