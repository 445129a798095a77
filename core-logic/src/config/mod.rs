//! # Batch Configuration
//!
//! [`BatchSettings`] is the raw, deserializable form of a run's parameters as
//! it appears in a config file. [`BatchSettings::into_config`] validates and
//! normalises it into a [`BatchConfig`], coercing out-of-range numbers to the
//! documented defaults.

use crate::error::ConfigError;
use crate::security::SecretKey;
use crate::utils::amount::AmountRange;
use crate::utils::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_DECIMALS: u32 = 18;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_RECEIPT_MAX_POLLS: u32 = 60;
pub const DEFAULT_RESULTS_PATH: &str = "results/results.json";

/// How sender × recipient pairs are scheduled across loop iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One worker per pair runs all `loop_count` transfers back to back,
    /// sleeping `delay` after each.
    Pairs,
    /// Every iteration spawns one task per pair and joins them all before
    /// sleeping `delay` and starting the next iteration.
    Rounds,
}

/// Per-chain defaults that the shared settings cannot know.
#[derive(Debug, Clone, Copy)]
pub struct ChainDefaults {
    pub min_native_balance: u128,
    pub dispatch: DispatchMode,
}

/// Keys are snake_case. The camelCase names written by the older JSON
/// settings files are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchSettings {
    #[serde(default, alias = "senderKeys")]
    pub sender_keys: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, alias = "erc20_contract", alias = "erc20Contract")]
    pub contract: String,
    /// Overrides `contract` when non-blank.
    #[serde(alias = "contractAddr")]
    pub contract_addr: Option<String>,
    /// Fixed amount; takes precedence over the min/max range.
    pub amount: Option<f64>,
    #[serde(alias = "minAmount")]
    pub min_amount: Option<f64>,
    #[serde(alias = "maxAmount")]
    pub max_amount: Option<f64>,
    pub decimals: Option<i64>,
    #[serde(alias = "loopCount")]
    pub loop_count: Option<i64>,
    #[serde(alias = "delay")]
    pub delay_ms: Option<u64>,
    pub max_concurrency: Option<i64>,
    /// Worker cap in older settings files; wins over `max_concurrency`.
    #[serde(alias = "maxGoroutines")]
    pub max_goroutines: Option<i64>,
    /// Lowest-precedence spelling of the worker cap.
    #[serde(alias = "maxConcurrent")]
    pub max_concurrent: Option<i64>,
    #[serde(default, alias = "wait_for_receipt", alias = "waitForReceipt")]
    pub wait_for_confirmation: bool,
    #[serde(alias = "retryCount")]
    pub retry_count: Option<i64>,
    #[serde(alias = "retryBackoffMs")]
    pub retry_backoff_ms: Option<u64>,
    /// Optional ceiling on the exponential backoff.
    pub retry_max_backoff_ms: Option<u64>,
    pub task_timeout_secs: Option<u64>,
    pub receipt_poll_interval_ms: Option<u64>,
    pub receipt_max_polls: Option<u32>,
    pub min_native_balance: Option<u64>,
    pub dispatch: Option<DispatchMode>,
    pub results_path: Option<String>,
}

/// Normalised run parameters.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub senders: Vec<SecretKey>,
    pub recipients: Vec<String>,
    pub contract: String,
    pub amount: AmountRange,
    pub loop_count: usize,
    pub delay: Duration,
    pub max_concurrency: usize,
    pub wait_for_confirmation: bool,
    pub retry: RetryPolicy,
    pub task_timeout: Duration,
    pub confirmation: ConfirmationPolicy,
    pub min_native_balance: u128,
    pub dispatch: DispatchMode,
    pub results_path: PathBuf,
}

/// Receipt polling budget used when waiting for confirmation.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            max_polls: DEFAULT_RECEIPT_MAX_POLLS,
        }
    }
}

impl BatchSettings {
    pub fn into_config(self, defaults: ChainDefaults) -> Result<BatchConfig, ConfigError> {
        let senders: Vec<SecretKey> = self
            .sender_keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(SecretKey::new)
            .collect();
        if senders.is_empty() {
            return Err(ConfigError::MissingField {
                field: "sender_keys".to_string(),
            });
        }

        let recipients: Vec<String> = self
            .recipients
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(ConfigError::MissingField {
                field: "recipients".to_string(),
            });
        }

        let contract = self
            .contract_addr
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.contract.trim())
            .to_string();
        if contract.is_empty() {
            return Err(ConfigError::MissingField {
                field: "contract".to_string(),
            });
        }

        let (min, max) = match (self.amount, self.min_amount, self.max_amount) {
            (Some(fixed), _, _) => (fixed, fixed),
            (None, Some(min), Some(max)) => (min, max),
            (None, Some(min), None) => (min, min),
            (None, None, Some(max)) => (max, max),
            (None, None, None) => {
                return Err(ConfigError::MissingField {
                    field: "amount or min_amount/max_amount".to_string(),
                })
            }
        };
        if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "amount".to_string(),
                reason: format!("expected non-negative numbers, got {}..{}", min, max),
            });
        }

        let decimals = match self.decimals {
            Some(d) if d > 0 => u32::try_from(d).map_err(|_| ConfigError::InvalidValue {
                field: "decimals".to_string(),
                reason: format!("{} is larger than 38", d),
            })?,
            _ => DEFAULT_DECIMALS,
        };
        // 10^38 already exceeds what a u128 amount can hold.
        if decimals > 38 {
            return Err(ConfigError::InvalidValue {
                field: "decimals".to_string(),
                reason: format!("{} is larger than 38", decimals),
            });
        }

        let max_attempts = u32::try_from(positive_or(self.retry_count, 1)).unwrap_or(u32::MAX);
        let mut retry = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS)),
        );
        if let Some(cap) = self.retry_max_backoff_ms {
            retry = retry.with_max_backoff(Duration::from_millis(cap));
        }

        let results_path = self
            .results_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESULTS_PATH.to_string());

        Ok(BatchConfig {
            senders,
            recipients,
            contract,
            amount: AmountRange::new(min, max, decimals),
            loop_count: positive_or(self.loop_count, 1),
            delay: Duration::from_millis(self.delay_ms.unwrap_or(0)),
            max_concurrency: match self
                .max_goroutines
                .or(self.max_concurrency)
                .or(self.max_concurrent)
            {
                None => DEFAULT_MAX_CONCURRENCY,
                Some(n) => positive_or(Some(n), 1),
            },
            wait_for_confirmation: self.wait_for_confirmation,
            retry,
            task_timeout: Duration::from_secs(
                self.task_timeout_secs
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_TASK_TIMEOUT_SECS),
            ),
            confirmation: ConfirmationPolicy {
                poll_interval: Duration::from_millis(
                    self.receipt_poll_interval_ms
                        .unwrap_or(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
                ),
                max_polls: self
                    .receipt_max_polls
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_RECEIPT_MAX_POLLS),
            },
            min_native_balance: self
                .min_native_balance
                .map(u128::from)
                .unwrap_or(defaults.min_native_balance),
            dispatch: self.dispatch.unwrap_or(defaults.dispatch),
            results_path: PathBuf::from(results_path),
        })
    }
}

fn positive_or(value: Option<i64>, fallback: usize) -> usize {
    match value {
        Some(v) if v > 0 => usize::try_from(v).unwrap_or(usize::MAX),
        _ => fallback,
    }
}

impl BatchConfig {
    /// Number of transfers the run will attempt.
    pub fn total_transfers(&self) -> usize {
        self.senders.len() * self.recipients.len() * self.loop_count
    }
}
