//! Per-sender nonce sequencing for concurrent transfer tasks.
//!
//! The first allocation for an address seeds its counter from the chain's
//! pending nonce; every later allocation hands out the next value locally.
//! Each address has its own lock, so senders never wait on each other and
//! callers sharing a sender are served strictly one at a time.

use crate::error::TransferError;
use crate::traits::ChainClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NonceAllocator {
    /// Maps sender address to the NEXT nonce to hand out; `None` until seeded.
    slots: StdMutex<HashMap<String, Arc<Mutex<Option<u64>>>>>,
}

impl NonceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next nonce for `address`.
    ///
    /// If the initial chain query fails nothing is stored, so the next call
    /// queries again.
    pub async fn allocate<C>(&self, client: &C, address: &str) -> Result<u64, TransferError>
    where
        C: ChainClient + ?Sized,
    {
        let slot = self.slot(address);
        let mut next = slot.lock().await;

        if let Some(nonce) = *next {
            *next = Some(nonce + 1);
            return Ok(nonce);
        }

        let base = client
            .pending_nonce(address)
            .await
            .map_err(|e| TransferError::NonceQuery(format!("{:#}", e)))?;
        debug!("Seeded nonce for {} at {}", address, base);
        *next = Some(base + 1);
        Ok(base)
    }

    /// The nonce the next allocation would return, if already seeded.
    pub async fn peek(&self, address: &str) -> Option<u64> {
        let slot = self.slot(address);
        let next = slot.lock().await;
        *next
    }

    fn slot(&self, address: &str) -> Arc<Mutex<Option<u64>>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}
