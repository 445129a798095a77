use config::{Config, Environment, File};
use core_logic::{
    BatchConfig, BatchSettings, ChainDefaults, ConfigError, CoreError, DispatchMode,
};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "EVM_TRANSFER";
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;
/// 0.001 ETH; senders below this cannot be trusted to cover gas.
pub const MIN_NATIVE_BALANCE_WEI: u128 = 1_000_000_000_000_000;

#[derive(Debug, Deserialize, Clone)]
pub struct EvmConfig {
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(flatten)]
    pub batch: BatchSettings,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

impl EvmConfig {
    /// Reads `path` (any format the `config` crate understands) and layers
    /// `EVM_TRANSFER_*` environment variables on top.
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let load_err = |e: config::ConfigError| ConfigError::Load {
            path: path.to_string(),
            msg: e.to_string(),
        };
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sender_keys")
                    .with_list_parse_key("recipients"),
            )
            .build()
            .map_err(load_err)?;

        let config: Self = settings.try_deserialize().map_err(load_err)?;
        if config.rpc_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "rpc_url".to_string(),
            }
            .into());
        }
        Ok(config)
    }

    pub fn defaults() -> ChainDefaults {
        ChainDefaults {
            min_native_balance: MIN_NATIVE_BALANCE_WEI,
            dispatch: DispatchMode::Pairs,
        }
    }

    pub fn batch_config(&self) -> Result<BatchConfig, ConfigError> {
        self.batch.clone().into_config(Self::defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let file = write_config(
            r#"
            rpc_url = "http://localhost:8545"
            sender_keys = ["0xabc"]
            recipients = ["0x0000000000000000000000000000000000000001"]
            erc20_contract = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"
            min_amount = 1.0
            max_amount = 2.0
            max_goroutines = 4
            "#,
        );
        let config = EvmConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.gas_limit, DEFAULT_GAS_LIMIT);

        let batch = config.batch_config().unwrap();
        assert_eq!(batch.max_concurrency, 4);
        assert_eq!(batch.min_native_balance, MIN_NATIVE_BALANCE_WEI);
        assert_eq!(batch.dispatch, DispatchMode::Pairs);
        assert_eq!(batch.amount.decimals, 18);
    }

    #[test]
    fn test_missing_contract_is_a_config_error() {
        let file = write_config(
            r#"
            rpc_url = "http://localhost:8545"
            sender_keys = ["0xabc"]
            recipients = ["0x0000000000000000000000000000000000000001"]
            amount = 1.0
            "#,
        );
        let config = EvmConfig::load(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(
            config.batch_config(),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
