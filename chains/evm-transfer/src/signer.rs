use crate::client::EvmClient;
use anyhow::Result;
use core_logic::{SecretKey, TransferSigner};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::to_checksum;

/// Signs with an in-memory secp256k1 key, EIP-155 replay protected.
pub struct EvmSigner {
    chain_id: u64,
}

impl EvmSigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    fn wallet(&self, credential: &SecretKey) -> Result<LocalWallet> {
        let wallet: LocalWallet = credential.hex_body().parse()?;
        Ok(wallet.with_chain_id(self.chain_id))
    }
}

impl TransferSigner<EvmClient> for EvmSigner {
    fn derive_address(&self, credential: &SecretKey) -> Result<String> {
        Ok(to_checksum(&self.wallet(credential)?.address(), None))
    }

    fn sign(&self, tx: TypedTransaction, credential: &SecretKey) -> Result<Bytes> {
        let wallet = self.wallet(credential)?;
        let signature = wallet.sign_transaction_sync(&tx)?;
        Ok(tx.rlp_signed(&signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (anvil/hardhat account #0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_derive_address() {
        let signer = EvmSigner::new(1);
        assert_eq!(
            signer.derive_address(&SecretKey::new(DEV_KEY)).unwrap(),
            DEV_ADDRESS
        );
        let bare = DEV_KEY.trim_start_matches("0x");
        assert_eq!(
            signer.derive_address(&SecretKey::new(bare)).unwrap(),
            DEV_ADDRESS
        );
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let signer = EvmSigner::new(1);
        assert!(signer.derive_address(&SecretKey::new("0xnothex")).is_err());
        assert!(signer.derive_address(&SecretKey::new("")).is_err());
    }

    #[test]
    fn test_signature_recovers_sender() {
        let signer = EvmSigner::new(11_155_111);
        let key = SecretKey::new(DEV_KEY);
        let tx: TypedTransaction = TransactionRequest::new()
            .to(Address::zero())
            .nonce(3u64)
            .gas(100_000u64)
            .gas_price(1_000_000_000u64)
            .chain_id(11_155_111u64)
            .into();

        let raw = signer.sign(tx.clone(), &key).unwrap();
        assert!(raw[0] >= 0xf8, "expected an RLP list, got {:#x}", raw[0]);

        let rlp = ethers::utils::rlp::Rlp::new(&raw);
        let (decoded, signature) = TypedTransaction::decode_signed(&rlp).unwrap();
        assert_eq!(decoded.nonce(), Some(&U256::from(3u64)));
        let recovered = signature.recover(decoded.sighash()).unwrap();
        assert_eq!(recovered, DEV_ADDRESS.parse::<Address>().unwrap());
    }
}
