//! Single-transfer pipeline.
//!
//! `credential -> balances -> nonce -> fee -> build/sign/submit -> receipt`
//!
//! Each stage short-circuits into a failed [`TransferResult`] carrying the
//! stage's [`TransferError`]. Nothing here retries; that is the job of
//! [`execute_with_retry`](crate::utils::retry::execute_with_retry).

use super::{TransferResult, TransferTask};
use crate::config::ConfirmationPolicy;
use crate::error::TransferError;
use crate::traits::{ChainClient, TransferDraft, TransferSigner};
use crate::utils::nonce::NonceAllocator;
use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    /// Native balance below which the sender cannot be trusted to pay fees.
    pub min_native_balance: u128,
    pub confirmation: ConfirmationPolicy,
}

pub struct TransferExecutor<C, S>
where
    C: ChainClient,
    S: TransferSigner<C>,
{
    client: Arc<C>,
    signer: Arc<S>,
    nonces: Arc<NonceAllocator>,
    settings: ExecutorSettings,
}

impl<C, S> Clone for TransferExecutor<C, S>
where
    C: ChainClient,
    S: TransferSigner<C>,
{
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            signer: self.signer.clone(),
            nonces: self.nonces.clone(),
            settings: self.settings,
        }
    }
}

impl<C, S> TransferExecutor<C, S>
where
    C: ChainClient,
    S: TransferSigner<C>,
{
    pub fn new(
        client: Arc<C>,
        signer: Arc<S>,
        nonces: Arc<NonceAllocator>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            client,
            signer,
            nonces,
            settings,
        }
    }

    pub fn nonces(&self) -> &Arc<NonceAllocator> {
        &self.nonces
    }

    /// Performs one transfer. Every chain call is bounded by `deadline`.
    pub async fn execute(&self, task: &TransferTask, deadline: Instant) -> TransferResult {
        let result = TransferResult::pending(task.recipient.clone(), task.amount);
        match self.run_stages(task, deadline, result).await {
            Ok(done) => done,
            Err((partial, error)) => {
                debug!(
                    "[S:{:03}] transfer to {} stopped at {}: {}",
                    task.sender_index + 1,
                    task.recipient,
                    error.kind(),
                    error
                );
                partial.fail(error)
            }
        }
    }

    async fn run_stages(
        &self,
        task: &TransferTask,
        deadline: Instant,
        mut result: TransferResult,
    ) -> std::result::Result<TransferResult, (TransferResult, TransferError)> {
        let address = match self.signer.derive_address(&task.credential) {
            Ok(address) => address,
            Err(e) => {
                return Err((result, TransferError::InvalidCredential(format!("{:#}", e))))
            }
        };
        result.from = address.clone();

        if let Err(e) = self.check_balances(&address, task, deadline).await {
            return Err((result, e));
        }

        let allocation = self.nonces.allocate(&*self.client, &address);
        let nonce = match within(deadline, "nonce query", allocation).await {
            Ok(Ok(nonce)) => nonce,
            Ok(Err(e)) => return Err((result, e)),
            Err(e) => return Err((result, TransferError::NonceQuery(format!("{:#}", e)))),
        };

        let fee = match within(deadline, "fee query", self.client.suggest_fee()).await {
            Ok(Ok(fee)) => fee,
            Ok(Err(e)) | Err(e) => {
                return Err((result, TransferError::FeeQuery(format!("{:#}", e))))
            }
        };

        let draft = TransferDraft {
            from: address.clone(),
            to: task.recipient.clone(),
            contract: task.contract.clone(),
            amount: task.amount,
            nonce,
            fee,
        };
        match self.sign_and_submit(&draft, task, deadline).await {
            Ok(tx_id) if tx_id.trim().is_empty() => {
                return Err((
                    result,
                    TransferError::Submission("node returned an empty transaction id".to_string()),
                ))
            }
            Ok(tx_id) => result.tx_hash = tx_id,
            Err(e) => return Err((result, TransferError::Submission(format!("{:#}", e)))),
        }
        info!(
            "[S:{:03}] submitted {} (nonce {}) -> {}",
            task.sender_index + 1,
            result.tx_hash,
            nonce,
            task.recipient
        );

        if task.wait_for_confirmation {
            match self.wait_for_receipt(&result.tx_hash, deadline).await {
                Ok(block) => result.block_number = Some(block),
                Err(e) => return Err((result, e)),
            }
        }

        Ok(result.succeed())
    }

    async fn check_balances(
        &self,
        address: &str,
        task: &TransferTask,
        deadline: Instant,
    ) -> std::result::Result<(), TransferError> {
        let native = flatten(within(deadline, "balance query", self.client.balance(address)).await)
            .map_err(|e| {
                TransferError::InsufficientBalance(format!("failed to get native balance: {:#}", e))
            })?;
        if native < self.settings.min_native_balance {
            return Err(TransferError::InsufficientBalance(format!(
                "insufficient native balance: {} (need at least {})",
                native, self.settings.min_native_balance
            )));
        }

        let token = flatten(
            within(
                deadline,
                "token balance query",
                self.client.token_balance(address, &task.contract),
            )
            .await,
        )
        .map_err(|e| {
            TransferError::InsufficientBalance(format!("failed to get token balance: {:#}", e))
        })?;
        if token < task.amount {
            return Err(TransferError::InsufficientBalance(format!(
                "insufficient token balance for transfer amount: {} < {}",
                token, task.amount
            )));
        }
        Ok(())
    }

    async fn sign_and_submit(
        &self,
        draft: &TransferDraft,
        task: &TransferTask,
        deadline: Instant,
    ) -> Result<String> {
        let unsigned = flatten(within(deadline, "build", self.client.build_transfer(draft)).await)?;
        let signed = self.signer.sign(unsigned, &task.credential)?;
        flatten(within(deadline, "submit", self.client.submit(signed)).await)
    }

    /// Polls for a mined receipt until the poll budget or the deadline runs out.
    async fn wait_for_receipt(
        &self,
        tx_id: &str,
        deadline: Instant,
    ) -> std::result::Result<u64, TransferError> {
        let policy = self.settings.confirmation;

        for poll in 0..policy.max_polls {
            if Instant::now() >= deadline {
                return Err(TransferError::ConfirmationTimeout(
                    "deadline exceeded while waiting for receipt".to_string(),
                ));
            }

            match within(deadline, "receipt query", self.client.receipt(tx_id)).await {
                Ok(Ok(Some(receipt))) => {
                    if receipt.reverted {
                        return Err(TransferError::Reverted(
                            receipt.detail.unwrap_or_default(),
                        ));
                    }
                    return Ok(receipt.block_number);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) | Err(e) => {
                    debug!("Receipt poll {} for {} failed: {:#}", poll + 1, tx_id, e);
                }
            }

            if poll + 1 < policy.max_polls {
                let wake = (Instant::now() + policy.poll_interval).min(deadline);
                tokio::time::sleep_until(wake).await;
            }
        }

        Err(TransferError::ConfirmationTimeout(
            "timeout waiting for receipt".to_string(),
        ))
    }
}

/// Bounds `fut` by `deadline`; expiry becomes an error naming the stage.
async fn within<T, F>(deadline: Instant, stage: &str, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| anyhow!("deadline exceeded during {}", stage))
}

fn flatten<T>(value: Result<Result<T>>) -> Result<T> {
    value.and_then(|inner| inner)
}
