use crate::address::TronAddress;
use crate::client::{SignedTransaction, TronClient, UnsignedTransaction};
use anyhow::{ensure, Result};
use core_logic::{SecretKey, TransferSigner};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// secp256k1 over the transaction id, i.e. SHA-256 of the raw data.
#[derive(Debug, Default, Clone, Copy)]
pub struct TronSigner;

impl TronSigner {
    pub fn new() -> Self {
        Self
    }
}

fn wallet(credential: &SecretKey) -> Result<LocalWallet> {
    Ok(credential.hex_body().parse()?)
}

impl TransferSigner<TronClient> for TronSigner {
    fn derive_address(&self, credential: &SecretKey) -> Result<String> {
        Ok(TronAddress::from_evm(wallet(credential)?.address()).to_string())
    }

    fn sign(&self, tx: UnsignedTransaction, credential: &SecretKey) -> Result<SignedTransaction> {
        let raw = hex::decode(&tx.raw_data_hex)?;
        let digest: [u8; 32] = Sha256::digest(&raw).into();
        ensure!(
            hex::encode(digest).eq_ignore_ascii_case(&tx.tx_id),
            "transaction id {} does not match its raw data",
            tx.tx_id
        );

        let signature = wallet(credential)?.sign_hash(H256::from(digest))?;
        let mut body = tx.body;
        let signature_hex = Value::String(hex::encode(signature.to_vec()));
        match body.get_mut("signature").and_then(Value::as_array_mut) {
            Some(signatures) => signatures.push(signature_hex),
            None => body["signature"] = Value::Array(vec![signature_hex]),
        }

        Ok(SignedTransaction {
            tx_id: tx.tx_id,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Signature;
    use serde_json::json;
    use std::str::FromStr;

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn unsigned(raw_data_hex: &str) -> UnsignedTransaction {
        let tx_id = hex::encode(Sha256::digest(hex::decode(raw_data_hex).unwrap()));
        UnsignedTransaction {
            tx_id: tx_id.clone(),
            raw_data_hex: raw_data_hex.to_string(),
            body: json!({ "txID": tx_id, "raw_data_hex": raw_data_hex, "visible": true }),
        }
    }

    #[test]
    fn test_address_is_prefixed_eth_address() {
        let address = TronSigner
            .derive_address(&SecretKey::new(DEV_KEY))
            .unwrap();
        assert!(address.starts_with('T'));
        let parsed: TronAddress = address.parse().unwrap();
        assert_eq!(
            parsed.to_hex(),
            "41f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_signature_covers_tx_id() {
        let tx = unsigned("0a025cd42208c1a0f1e5d8a5f2c840e0c4e1bdf8315a");
        let tx_id = tx.tx_id.clone();
        let signed = TronSigner.sign(tx, &SecretKey::new(DEV_KEY)).unwrap();

        let signatures = signed.body["signature"].as_array().unwrap();
        assert_eq!(signatures.len(), 1);
        let sig_hex = signatures[0].as_str().unwrap();
        assert_eq!(sig_hex.len(), 130);

        let signature = Signature::from_str(sig_hex).unwrap();
        let recovered = signature
            .recover(H256::from_str(&tx_id).unwrap())
            .unwrap();
        assert_eq!(
            TronAddress::from_evm(recovered).to_hex(),
            "41f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(signed.tx_id, tx_id);
    }

    #[test]
    fn test_mismatched_tx_id_is_refused() {
        let mut tx = unsigned("0a02");
        tx.tx_id = "00".repeat(32);
        assert!(TronSigner.sign(tx, &SecretKey::new(DEV_KEY)).is_err());
    }
}
