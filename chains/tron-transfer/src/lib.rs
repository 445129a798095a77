//! TRC-20 transfer dispatcher for TRON over the full-node HTTP API.

pub mod address;
pub mod client;
pub mod config;
pub mod signer;

pub use address::TronAddress;
pub use client::TronClient;
pub use config::TronConfig;
pub use signer::TronSigner;
