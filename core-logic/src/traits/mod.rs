use crate::security::SecretKey;
use anyhow::Result;
use async_trait::async_trait;

/// Fee parameters suggested by the chain for the next transfer.
///
/// On EVM chains `price` is the gas price in wei and `limit` the gas limit.
/// On TRON `price` is the energy price in sun and `limit` the fee limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeQuote {
    pub price: u128,
    pub limit: u64,
}

/// Mined-transaction status as reported by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub block_number: u64,
    pub reverted: bool,
    pub detail: Option<String>,
}

/// Everything the chain client needs to build an unsigned transfer.
#[derive(Debug, Clone)]
pub struct TransferDraft {
    pub from: String,
    pub to: String,
    pub contract: String,
    pub amount: u128,
    pub nonce: u64,
    pub fee: FeeQuote,
}

/// Chain access used by the transfer executor.
///
/// Implementations are shared by every in-flight task and must tolerate
/// concurrent callers.
#[async_trait]
pub trait ChainClient: Send + Sync {
    type UnsignedTx: Send + Sync;
    type SignedTx: Send + Sync;

    /// Next nonce the chain expects from `address`, counting pending txs.
    async fn pending_nonce(&self, address: &str) -> Result<u64>;

    /// Native-currency balance in the smallest unit.
    async fn balance(&self, address: &str) -> Result<u128>;

    /// Token balance held by `address` in `contract`, smallest unit.
    async fn token_balance(&self, address: &str, contract: &str) -> Result<u128>;

    async fn suggest_fee(&self) -> Result<FeeQuote>;

    async fn build_transfer(&self, draft: &TransferDraft) -> Result<Self::UnsignedTx>;

    /// Broadcasts a signed transaction and returns its identifier.
    async fn submit(&self, tx: Self::SignedTx) -> Result<String>;

    /// `None` until the transaction is mined.
    async fn receipt(&self, tx_id: &str) -> Result<Option<Receipt>>;
}

/// Key handling for one chain family.
///
/// Implementations must not retain or log the credential after a call.
pub trait TransferSigner<C: ChainClient + ?Sized>: Send + Sync {
    fn derive_address(&self, credential: &SecretKey) -> Result<String>;

    fn sign(&self, tx: C::UnsignedTx, credential: &SecretKey) -> Result<C::SignedTx>;
}
