//! # Utilities Module
//!
//! The concurrency primitives behind a batch run plus logger setup.

pub mod amount;
pub mod logger;
pub mod nonce;
pub mod retry;
pub mod runner;

pub use amount::{format_units, sample_amount, AmountRange};
pub use logger::setup_logger;
pub use nonce::NonceAllocator;
pub use retry::{execute_with_retry, is_transient, FailureClassifier, HeuristicClassifier, RetryPolicy};
pub use runner::BatchRunner;
