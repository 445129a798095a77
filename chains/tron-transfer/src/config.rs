use config::{Config, Environment, File};
use core_logic::{
    BatchConfig, BatchSettings, ChainDefaults, ConfigError, CoreError, DispatchMode,
};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "TRON_TRANSFER";
pub const DEFAULT_NODE_URL: &str = "https://nile.trongrid.io";
/// 5 TRX, in sun.
pub const DEFAULT_FEE_LIMIT: u64 = 5_000_000;
pub const MIN_NATIVE_BALANCE_SUN: u128 = 5_000_000;

#[derive(Debug, Deserialize, Clone)]
pub struct TronConfig {
    #[serde(default = "default_node_url", alias = "rpc_url", alias = "grpc_url")]
    pub node_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_fee_limit")]
    pub fee_limit: u64,
    #[serde(flatten)]
    pub batch: BatchSettings,
}

fn default_node_url() -> String {
    DEFAULT_NODE_URL.to_string()
}

fn default_fee_limit() -> u64 {
    DEFAULT_FEE_LIMIT
}

impl TronConfig {
    /// Reads `path` and layers `TRON_TRANSFER_*` environment variables on top.
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
        if config.fee_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fee_limit".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(config)
    }

    pub fn defaults() -> ChainDefaults {
        ChainDefaults {
            min_native_balance: MIN_NATIVE_BALANCE_SUN,
            dispatch: DispatchMode::Rounds,
        }
    }

    pub fn batch_config(&self) -> Result<BatchConfig, ConfigError> {
        self.batch.clone().into_config(Self::defaults())
    }
}
