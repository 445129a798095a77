#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use core_logic::{
    BatchConfig, BatchSettings, ChainClient, ChainDefaults, DispatchMode, FeeQuote, Receipt,
    SecretKey, TransferDraft, TransferSigner,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum ReceiptMode {
    /// Mined in the given block on the first poll.
    Mined(u64),
    /// Mined after `polls` empty answers.
    MinedAfter { polls: usize, block: u64 },
    Reverted,
    Never,
}

#[derive(Debug, Clone)]
pub struct Submitted {
    pub from: String,
    pub to: String,
    pub nonce: u64,
    pub amount: u128,
}

/// In-memory chain that records what it was asked to do.
pub struct MockChain {
    pub base_nonce: u64,
    pub native_balance: u128,
    pub token_balance: u128,
    pub work_delay: Duration,
    pub receipt_mode: ReceiptMode,
    pub fail_fee: bool,
    /// Submits succeed but report a blank transaction id.
    pub empty_tx_id: bool,
    pub nonce_failures: AtomicUsize,
    pub submit_errors: Mutex<VecDeque<String>>,
    pub nonce_queries: AtomicUsize,
    pub receipt_polls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub submitted: Mutex<Vec<Submitted>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            base_nonce: 7,
            native_balance: 10u128.pow(18),
            token_balance: 10u128.pow(30),
            work_delay: Duration::ZERO,
            receipt_mode: ReceiptMode::Mined(100),
            fail_fee: false,
            empty_tx_id: false,
            nonce_failures: AtomicUsize::new(0),
            submit_errors: Mutex::new(VecDeque::new()),
            nonce_queries: AtomicUsize::new(0),
            receipt_polls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` pending-nonce queries fail.
    pub fn failing_nonce_queries(self, n: usize) -> Self {
        self.nonce_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Queues errors returned by successive submits before they start succeeding.
    pub fn failing_submits(self, errors: &[&str]) -> Self {
        self.submit_errors
            .lock()
            .unwrap()
            .extend(errors.iter().map(|e| e.to_string()));
        self
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }
}

/// Counts a transfer as in flight until dropped, whatever path it leaves by.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    type UnsignedTx = TransferDraft;
    type SignedTx = (TransferDraft, String);

    async fn pending_nonce(&self, _address: &str) -> Result<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let remaining = self.nonce_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.nonce_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("connection refused"));
        }
        Ok(self.base_nonce)
    }

    async fn balance(&self, _address: &str) -> Result<u128> {
        let _guard = self.enter();
        if !self.work_delay.is_zero() {
            tokio::time::sleep(self.work_delay).await;
        }
        Ok(self.native_balance)
    }

    async fn token_balance(&self, _address: &str, _contract: &str) -> Result<u128> {
        Ok(self.token_balance)
    }

    async fn suggest_fee(&self) -> Result<FeeQuote> {
        if self.fail_fee {
            return Err(anyhow!("503 from upstream"));
        }
        Ok(FeeQuote {
            price: 1_000_000_000,
            limit: 100_000,
        })
    }

    async fn build_transfer(&self, draft: &TransferDraft) -> Result<TransferDraft> {
        Ok(draft.clone())
    }

    async fn submit(&self, tx: (TransferDraft, String)) -> Result<String> {
        let (draft, _signature) = tx;
        if let Some(err) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(anyhow!(err));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(Submitted {
            from: draft.from.clone(),
            to: draft.to.clone(),
            nonce: draft.nonce,
            amount: draft.amount,
        });
        if self.empty_tx_id {
            return Ok(String::new());
        }
        Ok(format!("0x{}-{}", draft.from, draft.nonce))
    }

    async fn receipt(&self, _tx_id: &str) -> Result<Option<Receipt>> {
        let polls = self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.receipt_mode {
            ReceiptMode::Mined(block) => Some(Receipt {
                block_number: block,
                reverted: false,
                detail: None,
            }),
            ReceiptMode::MinedAfter { polls: wait, block } if polls >= wait => Some(Receipt {
                block_number: block,
                reverted: false,
                detail: None,
            }),
            ReceiptMode::MinedAfter { .. } | ReceiptMode::Never => None,
            ReceiptMode::Reverted => Some(Receipt {
                block_number: 55,
                reverted: true,
                detail: Some("REVERT".to_string()),
            }),
        })
    }
}

/// Addresses are `addr-<key>`; the key `bad` is rejected.
pub struct MockSigner;

impl TransferSigner<MockChain> for MockSigner {
    fn derive_address(&self, credential: &SecretKey) -> Result<String> {
        if credential.expose() == "bad" {
            return Err(anyhow!("invalid hex character"));
        }
        Ok(format!("addr-{}", credential.expose()))
    }

    fn sign(&self, tx: TransferDraft, _credential: &SecretKey) -> Result<(TransferDraft, String)> {
        Ok((tx, "sig".to_string()))
    }
}

pub fn settings(senders: &[&str], recipients: &[&str]) -> BatchSettings {
    BatchSettings {
        sender_keys: senders.iter().map(|s| s.to_string()).collect(),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        contract: "token".to_string(),
        min_amount: Some(1.0),
        max_amount: Some(2.0),
        decimals: Some(6),
        ..Default::default()
    }
}

pub fn build(settings: BatchSettings, dispatch: DispatchMode) -> BatchConfig {
    settings
        .into_config(ChainDefaults {
            min_native_balance: 1_000,
            dispatch,
        })
        .expect("valid test config")
}
