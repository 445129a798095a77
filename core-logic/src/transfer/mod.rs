//! # Transfers
//!
//! The unit of work ([`TransferTask`]), its outcome ([`TransferResult`]) and
//! the single-transfer pipeline in [`executor`].

pub mod executor;

pub use executor::TransferExecutor;

use crate::error::TransferError;
use crate::security::SecretKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One requested transfer. Built by the runner and consumed once.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub credential: SecretKey,
    /// Position of the sender in the configured list, used in log lines.
    pub sender_index: usize,
    pub recipient: String,
    pub contract: String,
    /// Amount in the token's smallest unit.
    pub amount: u128,
    pub wait_for_confirmation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::Success => write!(f, "success"),
            TransferStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a task as written to the results document.
///
/// `status == Success` implies a non-empty `tx_hash`; `status == Failed`
/// implies a non-empty `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub from: String,
    pub to: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
    pub tx_hash: String,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub attempts: u32,
}

impl TransferResult {
    pub fn pending(to: impl Into<String>, amount: u128) -> Self {
        Self {
            from: String::new(),
            to: to.into(),
            amount,
            tx_hash: String::new(),
            status: TransferStatus::Pending,
            error: None,
            error_kind: None,
            block_number: None,
            attempts: 0,
        }
    }

    pub fn fail(mut self, error: TransferError) -> Self {
        self.status = TransferStatus::Failed;
        self.error_kind = Some(error.kind().to_string());
        self.error = Some(error.to_string());
        self
    }

    pub fn succeed(mut self) -> Self {
        self.status = TransferStatus::Success;
        self.error = None;
        self.error_kind = None;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransferStatus::Failed
    }
}

/// u128 amounts overflow JSON number precision, so they travel as strings.
mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_serialization() {
        let result = TransferResult {
            from: "0xA".into(),
            ..TransferResult::pending("0xB", 5)
        }
        .fail(TransferError::Submission("nonce too low".into()));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["from"], "0xA");
        assert_eq!(json["to"], "0xB");
        assert_eq!(json["amount"], "5");
        assert_eq!(json["txHash"], "");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "transfer failed: nonce too low");
        assert_eq!(json["errorKind"], "SubmissionError");
        assert!(json.get("blockNumber").is_none());
    }

    #[test]
    fn test_success_omits_error_fields() {
        let mut result = TransferResult::pending("0xB", 10_000_000_000_000_000_000);
        result.tx_hash = "0xhash".into();
        result.block_number = Some(42);
        let result = result.succeed();

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"blockNumber\":42"));
        assert!(json.contains("\"amount\":\"10000000000000000000\""));
        assert!(!json.contains("error"));

        let back: TransferResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
