use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use core_logic::{ChainClient, FeeQuote, Receipt, TransferDraft};
use ethers::abi::parse_abi;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use reqwest::Client;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const ERC20_ABI: &[&str] = &[
    "function balanceOf(address owner) external view returns (uint256)",
    "function transfer(address to, uint256 amount) external returns (bool)",
];

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// ERC-20 transfers over a JSON-RPC HTTP provider.
///
/// Transactions use the legacy `gasPrice` form with a fixed gas limit.
pub struct EvmClient {
    provider: Provider<Http>,
    chain_id: u64,
    gas_limit: u64,
    erc20: BaseContract,
}

impl EvmClient {
    pub fn connect(rpc_url: &str, chain_id: u64, gas_limit: u64) -> Result<Self> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let url = reqwest::Url::parse(rpc_url).with_context(|| format!("bad rpc_url {}", rpc_url))?;
        let provider = Provider::new(Http::new_with_client(url, http));
        let erc20 = BaseContract::from(parse_abi(ERC20_ABI)?);

        Ok(Self {
            provider,
            chain_id,
            gas_limit,
            erc20,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fails when the node is unreachable or serves a different chain.
    pub async fn verify_chain_id(&self) -> Result<()> {
        let remote = self
            .provider
            .get_chainid()
            .await
            .context("failed to connect to RPC")?;
        if remote != U256::from(self.chain_id) {
            bail!(
                "RPC reports chain id {} but config expects {}",
                remote,
                self.chain_id
            );
        }
        info!("Connected to chain {}", self.chain_id);
        Ok(())
    }
}

pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim()).map_err(|e| anyhow!("invalid address {}: {}", value, e))
}

fn to_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    type UnsignedTx = TypedTransaction;
    type SignedTx = Bytes;

    async fn pending_nonce(&self, address: &str) -> Result<u64> {
        let nonce = self
            .provider
            .get_transaction_count(parse_address(address)?, Some(BlockNumber::Pending.into()))
            .await?;
        Ok(nonce.as_u64())
    }

    async fn balance(&self, address: &str) -> Result<u128> {
        let balance = self
            .provider
            .get_balance(parse_address(address)?, None)
            .await?;
        Ok(to_u128(balance))
    }

    async fn token_balance(&self, address: &str, contract: &str) -> Result<u128> {
        let data = self.erc20.encode("balanceOf", parse_address(address)?)?;
        let call: TypedTransaction = TransactionRequest::new()
            .to(parse_address(contract)?)
            .data(data)
            .into();
        let output = self.provider.call(&call, None).await?;
        let balance: U256 = self.erc20.decode_output("balanceOf", output)?;
        Ok(to_u128(balance))
    }

    async fn suggest_fee(&self) -> Result<FeeQuote> {
        let price = self.provider.get_gas_price().await?;
        Ok(FeeQuote {
            price: to_u128(price),
            limit: self.gas_limit,
        })
    }

    async fn build_transfer(&self, draft: &TransferDraft) -> Result<TypedTransaction> {
        let data = self.erc20.encode(
            "transfer",
            (parse_address(&draft.to)?, U256::from(draft.amount)),
        )?;
        let tx = TransactionRequest::new()
            .from(parse_address(&draft.from)?)
            .to(parse_address(&draft.contract)?)
            .data(data)
            .nonce(draft.nonce)
            .gas(draft.fee.limit)
            .gas_price(U256::from(draft.fee.price))
            .chain_id(self.chain_id);
        Ok(tx.into())
    }

    async fn submit(&self, raw: Bytes) -> Result<String> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(format!("{:?}", pending.tx_hash()))
    }

    async fn receipt(&self, tx_id: &str) -> Result<Option<Receipt>> {
        let hash = H256::from_str(tx_id).map_err(|e| anyhow!("invalid tx hash {}: {}", tx_id, e))?;
        let Some(receipt) = self.provider.get_transaction_receipt(hash).await? else {
            return Ok(None);
        };
        let Some(block) = receipt.block_number else {
            debug!("Receipt for {} has no block yet", tx_id);
            return Ok(None);
        };

        Ok(Some(Receipt {
            block_number: block.as_u64(),
            reverted: receipt.status == Some(U64::zero()),
            detail: None,
        }))
    }
}
