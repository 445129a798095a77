//! TRON address codec and the ABI parameter encoding TRC-20 calls need.
//!
//! A TRON address is the 20-byte Ethereum-style account id behind a `0x41`
//! prefix byte. The canonical text form is base58check (`T...`); the node API
//! also accepts the 42 character hex form.

use anyhow::{anyhow, ensure, Result};
use ethers::abi::{encode, Token};
use ethers::types::{Address, U256};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_PREFIX: u8 = 0x41;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TronAddress([u8; 21]);

impl TronAddress {
    pub fn from_evm(address: Address) -> Self {
        let mut bytes = [0u8; 21];
        bytes[0] = ADDRESS_PREFIX;
        bytes[1..].copy_from_slice(address.as_bytes());
        Self(bytes)
    }

    /// The account id without the prefix, as used inside ABI parameters.
    pub fn evm(&self) -> Address {
        Address::from_slice(&self.0[1..])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for TronAddress {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let bytes = if value.len() == 42 && value.starts_with("41") {
            hex::decode(value).map_err(|e| anyhow!("invalid TRON address {}: {}", value, e))?
        } else {
            bs58::decode(value)
                .with_check(None)
                .into_vec()
                .map_err(|e| anyhow!("invalid TRON address {}: {}", value, e))?
        };
        ensure!(
            bytes.len() == 21 && bytes[0] == ADDRESS_PREFIX,
            "invalid TRON address {}: wrong length or prefix",
            value
        );

        let mut out = [0u8; 21];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).with_check().into_string())
    }
}

/// `balanceOf(address)` parameter block, hex without `0x`.
pub fn encode_address_param(owner: &TronAddress) -> String {
    hex::encode(encode(&[Token::Address(owner.evm())]))
}

/// `transfer(address,uint256)` parameter block, hex without `0x`.
pub fn encode_transfer_params(to: &TronAddress, amount: u128) -> String {
    hex::encode(encode(&[
        Token::Address(to.evm()),
        Token::Uint(U256::from(amount)),
    ]))
}

/// Reads the first 32-byte word of a constant call result.
pub fn decode_uint(word: &str) -> Result<u128> {
    let bytes = hex::decode(word.trim_start_matches("0x"))?;
    ensure!(bytes.len() >= 32, "short uint result: {} bytes", bytes.len());
    let value = U256::from_big_endian(&bytes[..32]);
    Ok(if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDT_BASE58: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const USDT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";

    #[test]
    fn test_base58_and_hex_forms_agree() {
        let from_b58: TronAddress = USDT_BASE58.parse().unwrap();
        let from_hex: TronAddress = USDT_HEX.parse().unwrap();
        assert_eq!(from_b58, from_hex);
        assert_eq!(from_b58.to_hex(), USDT_HEX);
        assert_eq!(from_hex.to_string(), USDT_BASE58);
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let corrupted = format!("{}u", &USDT_BASE58[..USDT_BASE58.len() - 1]);
        assert!(corrupted.parse::<TronAddress>().is_err());
        assert!("0xa614f803b6fd780986a42c78ec9c7f77e6ded13c"
            .parse::<TronAddress>()
            .is_err());
        assert!("".parse::<TronAddress>().is_err());
    }

    #[test]
    fn test_evm_round_trip_keeps_prefix() {
        let address: TronAddress = USDT_HEX.parse().unwrap();
        let evm = address.evm();
        assert_eq!(
            format!("{:?}", evm),
            "0xa614f803b6fd780986a42c78ec9c7f77e6ded13c"
        );
        assert_eq!(TronAddress::from_evm(evm), address);
    }

    #[test]
    fn test_transfer_params_layout() {
        let to: TronAddress = USDT_HEX.parse().unwrap();
        let params = encode_transfer_params(&to, 1_000_000);
        assert_eq!(params.len(), 128);
        assert_eq!(&params[..24], "0".repeat(24));
        assert_eq!(&params[24..64], &USDT_HEX[2..]);
        assert!(params.ends_with("0f4240"));
        assert_eq!(encode_address_param(&to), params[..64]);
    }

    #[test]
    fn test_decode_uint() {
        let word = format!("{:0>64}", "0f4240");
        assert_eq!(decode_uint(&word).unwrap(), 1_000_000);
        assert!(decode_uint("0f4240").is_err());
    }
}
