//! # Result Reporting
//!
//! Console lines for individual transfers, the end-of-run summary and the
//! JSON results document.

use crate::error::CoreError;
use crate::transfer::TransferResult;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const RESULTS_PATH_ENV: &str = "RESULTS_PATH";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn from_results(results: &[TransferResult], elapsed: Duration) -> Self {
        let success = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            success,
            failed: results.len() - success,
            elapsed,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }
}

/// Logs one finished transfer on the `task_result` target.
pub fn log_result(sender_index: usize, result: &TransferResult) {
    if result.is_success() {
        let block = result
            .block_number
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            target: "task_result",
            "[S:{:03}] -> {} SUCCESS tx {} (B: {}) from {} after {} attempt(s)",
            sender_index + 1,
            result.to,
            result.tx_hash,
            block,
            result.from,
            result.attempts
        );
    } else {
        let raw_err = result.error.as_deref().unwrap_or_default().replace('\n', " | ");
        warn!(
            target: "task_result",
            "[S:{:03}] -> {} FAILED [{}] {} from {} after {} attempt(s)",
            sender_index + 1,
            result.to,
            result.error_kind.as_deref().unwrap_or("Error"),
            raw_err,
            display_or_unknown(&result.from),
            result.attempts
        );
    }
}

/// Logs the run totals followed by every failure with its sender/recipient.
pub fn log_summary(summary: &BatchSummary, results: &[TransferResult]) {
    for (i, r) in results.iter().enumerate().filter(|(_, r)| r.is_failed()) {
        warn!(
            target: "task_result",
            "Transfer {} FAILED {} -> {}: {}",
            i + 1,
            display_or_unknown(&r.from),
            r.to,
            r.error.as_deref().unwrap_or_default()
        );
    }
    info!(
        target: "task_result",
        "Total Time: {:.1}s | Total: {} | Success: {} | Failed: {} | Success Rate: {:.2}%",
        summary.elapsed.as_secs_f64(),
        summary.total,
        summary.success,
        summary.failed,
        summary.success_rate()
    );
}

/// Writes `results` as a pretty JSON array, creating parent directories.
pub fn persist_results(path: &Path, results: &[TransferResult]) -> Result<(), CoreError> {
    let persist_err = |msg: String| CoreError::Persist {
        path: path.display().to_string(),
        msg,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(results).map_err(|e| persist_err(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| persist_err(e.to_string()))?;
    Ok(())
}

/// `RESULTS_PATH` wins over the configured location when set.
pub fn resolve_results_path(configured: &Path) -> PathBuf {
    match std::env::var(RESULTS_PATH_ENV) {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
        _ => configured.to_path_buf(),
    }
}

fn display_or_unknown(address: &str) -> &str {
    if address.is_empty() {
        "<unknown sender>"
    } else {
        address
    }
}
