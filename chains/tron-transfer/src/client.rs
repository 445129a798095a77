use crate::address::{decode_uint, encode_address_param, encode_transfer_params, TronAddress};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use core_logic::{ChainClient, FeeQuote, Receipt, TransferDraft};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// `TRON-PRO-API-KEY`; header names are stored lower-case.
pub const API_KEY_HEADER: &str = "tron-pro-api-key";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// A transaction built by the node, not yet signed.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub tx_id: String,
    pub raw_data_hex: String,
    /// The node's JSON form, sent back verbatim on broadcast.
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx_id: String,
    pub body: Value,
}

/// TRC-20 transfers through the full-node HTTP wallet API (TronGrid or a
/// self-hosted node). TRON has no account nonce, so [`ChainClient::pending_nonce`]
/// always reports 0 and the allocator's counter is a local sequence only.
pub struct TronClient {
    http: Client,
    base_url: String,
    fee_limit: u64,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    balance: u64,
}

#[derive(Debug, Default, Deserialize)]
struct CallResult {
    #[serde(default)]
    result: bool,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    #[serde(default)]
    result: CallResult,
    transaction: Option<Value>,
    #[serde(default)]
    constant_result: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(default)]
    result: bool,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainParameters {
    #[serde(default)]
    chain_parameter: Vec<ChainParameter>,
}

#[derive(Debug, Deserialize)]
struct ChainParameter {
    key: String,
    value: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInfo {
    id: Option<String>,
    block_number: Option<u64>,
    receipt: Option<ReceiptInfo>,
    result: Option<String>,
    res_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptInfo {
    result: Option<String>,
}

impl TronClient {
    pub fn connect(node_url: &str, api_key: Option<&str>, fee_limit: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            headers.insert(API_KEY_HEADER, HeaderValue::from_str(key)?);
        }
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .default_headers(headers)
            .build()?;
        let base_url = node_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).with_context(|| format!("bad node_url {}", node_url))?;

        Ok(Self {
            http,
            base_url,
            fee_limit,
        })
    }

    /// Fetches the head block to prove the node is reachable.
    pub async fn latest_block(&self) -> Result<u64> {
        let block: Value = self
            .post("/wallet/getnowblock", json!({}))
            .await
            .context("failed to connect to TRON node")?;
        let number = block
            .pointer("/block_header/raw_data/number")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("unexpected getnowblock response"))?;
        info!("Connected to TRON node at {} (head block {})", self.base_url, number);
        Ok(number)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("rpc request {} failed", path))?
            .error_for_status()
            .with_context(|| format!("rpc request {} rejected", path))?;
        response
            .json()
            .await
            .with_context(|| format!("rpc response {} unreadable", path))
    }
}

/// Node error messages are often hex-encoded UTF-8.
pub fn decode_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| message.to_string())
}

fn call_error(result: &CallResult) -> String {
    let message = result.message.as_deref().map(decode_message).unwrap_or_default();
    match result.code.as_deref() {
        Some(code) if message.is_empty() => code.to_string(),
        Some(code) => format!("{}: {}", code, message),
        None if message.is_empty() => "node returned no transaction".to_string(),
        None => message,
    }
}

fn unsigned_from(response: TriggerResponse) -> Result<UnsignedTransaction> {
    if !response.result.result {
        bail!(call_error(&response.result));
    }
    let body = response
        .transaction
        .ok_or_else(|| anyhow!("node returned no transaction"))?;
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("transaction is missing {}", name))
    };
    let tx_id = field("txID")?;
    let raw_data_hex = field("raw_data_hex")?;

    Ok(UnsignedTransaction {
        tx_id,
        raw_data_hex,
        body,
    })
}

fn receipt_from(info: TransactionInfo) -> Option<Receipt> {
    info.id.as_ref()?;
    let block_number = info.block_number?;

    let status = info.receipt.and_then(|r| r.result);
    let failed = info.result.as_deref() == Some("FAILED");
    let reverted = failed || status.as_deref().is_some_and(|s| s != "SUCCESS");

    let detail = reverted.then(|| {
        let message = info.res_message.as_deref().map(decode_message);
        match (status, message) {
            (Some(s), Some(m)) => format!("{}: {}", s, m),
            (Some(s), None) => s,
            (None, Some(m)) => m,
            (None, None) => "FAILED".to_string(),
        }
    });

    Some(Receipt {
        block_number,
        reverted,
        detail,
    })
}

#[async_trait]
impl ChainClient for TronClient {
    type UnsignedTx = UnsignedTransaction;
    type SignedTx = SignedTransaction;

    async fn pending_nonce(&self, _address: &str) -> Result<u64> {
        Ok(0)
    }

    async fn balance(&self, address: &str) -> Result<u128> {
        let account: AccountResponse = self
            .post(
                "/wallet/getaccount",
                json!({ "address": address, "visible": true }),
            )
            .await?;
        Ok(account.balance as u128)
    }

    async fn token_balance(&self, address: &str, contract: &str) -> Result<u128> {
        let owner: TronAddress = address.parse()?;
        let response: TriggerResponse = self
            .post(
                "/wallet/triggerconstantcontract",
                json!({
                    "owner_address": address,
                    "contract_address": contract,
                    "function_selector": "balanceOf(address)",
                    "parameter": encode_address_param(&owner),
                    "visible": true,
                }),
            )
            .await?;
        if !response.result.result {
            bail!(call_error(&response.result));
        }
        let word = response
            .constant_result
            .first()
            .ok_or_else(|| anyhow!("balanceOf returned nothing"))?;
        decode_uint(word)
    }

    /// The energy price in sun; the limit is the configured fee limit.
    async fn suggest_fee(&self) -> Result<FeeQuote> {
        let params: ChainParameters = self.post("/wallet/getchainparameters", json!({})).await?;
        let energy_fee = params
            .chain_parameter
            .iter()
            .find(|p| p.key == "getEnergyFee")
            .and_then(|p| p.value)
            .ok_or_else(|| anyhow!("getEnergyFee missing from chain parameters"))?;
        Ok(FeeQuote {
            price: energy_fee.max(0) as u128,
            limit: self.fee_limit,
        })
    }

    async fn build_transfer(&self, draft: &TransferDraft) -> Result<UnsignedTransaction> {
        let to: TronAddress = draft.to.parse()?;
        let response: TriggerResponse = self
            .post(
                "/wallet/triggersmartcontract",
                json!({
                    "owner_address": draft.from,
                    "contract_address": draft.contract,
                    "function_selector": "transfer(address,uint256)",
                    "parameter": encode_transfer_params(&to, draft.amount),
                    "fee_limit": draft.fee.limit,
                    "call_value": 0,
                    "visible": true,
                }),
            )
            .await?;
        let unsigned = unsigned_from(response)?;
        debug!(
            "Built {} (sequence {}) {} -> {}",
            unsigned.tx_id, draft.nonce, draft.from, draft.to
        );
        Ok(unsigned)
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<String> {
        let response: BroadcastResponse = self.post("/wallet/broadcasttransaction", tx.body).await?;
        if !response.result {
            let result = CallResult {
                result: false,
                code: response.code,
                message: response.message,
            };
            bail!("broadcast rejected: {}", call_error(&result));
        }
        Ok(tx.tx_id)
    }

    async fn receipt(&self, tx_id: &str) -> Result<Option<Receipt>> {
        let info: TransactionInfo = self
            .post("/wallet/gettransactioninfobyid", json!({ "value": tx_id }))
            .await?;
        Ok(receipt_from(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(body: Value) -> TransactionInfo {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_unknown_transaction_has_no_receipt() {
        assert!(receipt_from(info(json!({}))).is_none());
    }

    #[test]
    fn test_successful_receipt() {
        let receipt = receipt_from(info(json!({
            "id": "ab",
            "blockNumber": 51234567,
            "receipt": { "result": "SUCCESS", "energy_usage_total": 14650 }
        })))
        .unwrap();
        assert_eq!(receipt.block_number, 51_234_567);
        assert!(!receipt.reverted);
        assert_eq!(receipt.detail, None);
    }

    #[test]
    fn test_reverted_receipt_decodes_message() {
        let receipt = receipt_from(info(json!({
            "id": "ab",
            "blockNumber": 10,
            "result": "FAILED",
            "resMessage": hex::encode("REVERT opcode executed"),
            "receipt": { "result": "REVERT" }
        })))
        .unwrap();
        assert!(receipt.reverted);
        assert_eq!(
            receipt.detail.as_deref(),
            Some("REVERT: REVERT opcode executed")
        );
    }

    #[test]
    fn test_out_of_energy_counts_as_reverted() {
        let receipt = receipt_from(info(json!({
            "id": "ab",
            "blockNumber": 10,
            "receipt": { "result": "OUT_OF_ENERGY" }
        })))
        .unwrap();
        assert!(receipt.reverted);
        assert_eq!(receipt.detail.as_deref(), Some("OUT_OF_ENERGY"));
    }

    #[test]
    fn test_trigger_failure_message() {
        let response: TriggerResponse = serde_json::from_value(json!({
            "result": {
                "code": "CONTRACT_VALIDATE_ERROR",
                "message": hex::encode("account does not exist")
            }
        }))
        .unwrap();
        let err = unsigned_from(response).unwrap_err();
        assert_eq!(
            err.to_string(),
            "CONTRACT_VALIDATE_ERROR: account does not exist"
        );
    }

    #[test]
    fn test_trigger_success_extracts_transaction() {
        let response: TriggerResponse = serde_json::from_value(json!({
            "result": { "result": true },
            "transaction": {
                "txID": "f00d",
                "raw_data_hex": "0a02",
                "raw_data": { "fee_limit": 5000000 },
                "visible": true
            }
        }))
        .unwrap();
        let tx = unsigned_from(response).unwrap();
        assert_eq!(tx.tx_id, "f00d");
        assert_eq!(tx.raw_data_hex, "0a02");
        assert_eq!(tx.body["raw_data"]["fee_limit"], 5_000_000);
    }

    #[test]
    fn test_plain_messages_pass_through() {
        assert_eq!(decode_message("not hex"), "not hex");
        assert_eq!(
            decode_message(&hex::encode("Validate signature error")),
            "Validate signature error"
        );
    }

    #[test]
    fn test_api_key_header_is_accepted() {
        assert!(TronClient::connect("https://nile.trongrid.io/", Some("abc-123"), 1).is_ok());
        assert!(TronClient::connect("nile", None, 1).is_err());
    }

    #[tokio::test]
    async fn test_pending_nonce_is_always_zero() {
        let client = TronClient::connect("https://nile.trongrid.io", None, 1).unwrap();
        assert_eq!(client.pending_nonce("TAny").await.unwrap(), 0);
    }
}
