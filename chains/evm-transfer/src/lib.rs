//! ERC-20 transfer dispatcher for Ethereum-compatible chains.

pub mod client;
pub mod config;
pub mod signer;

pub use client::EvmClient;
pub use config::EvmConfig;
pub use signer::EvmSigner;
