//! # Core Logic - Shared Transfer Dispatcher
//!
//! This crate holds everything the chain binaries share: the bounded
//! concurrency batch runner, per-sender nonce sequencing, amount sampling,
//! transient-failure retry and result reporting. Chain access is abstracted
//! behind [`ChainClient`] and [`TransferSigner`].
//!
//! ## Modules
//!
//! - [`config`] - Batch settings and their normalised form
//! - [`error`] - Typed error handling with thiserror
//! - [`report`] - Console summary and JSON results document
//! - [`security`] - Zeroizing credential wrapper
//! - [`traits`] - Chain client and signer seams
//! - [`transfer`] - Transfer task/result and the single-transfer executor
//! - [`utils`] - Nonce allocator, amount sampler, retry, runner, logger

pub mod config;
pub mod error;
pub mod report;
pub mod security;
pub mod traits;
pub mod transfer;
pub mod utils;

pub use config::{BatchConfig, BatchSettings, ChainDefaults, ConfirmationPolicy, DispatchMode};
pub use error::{ConfigError, CoreError, TransferError};
pub use report::{log_summary, persist_results, resolve_results_path, BatchSummary};
pub use security::SecretKey;
pub use traits::{ChainClient, FeeQuote, Receipt, TransferDraft, TransferSigner};
pub use transfer::{TransferExecutor, TransferResult, TransferStatus, TransferTask};
pub use utils::{
    execute_with_retry, is_transient, sample_amount, setup_logger, AmountRange, BatchRunner,
    FailureClassifier, HeuristicClassifier, NonceAllocator, RetryPolicy,
};
