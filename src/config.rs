use serde::Deserialize;
use std::collections::HashMap;

use crate::chain::gateway::RpcServerType;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
  pub scanner: ScannerSettings,
  pub store: StoreSettings,

  // 감시 주소 -> 계정 키
  #[serde(default)]
  pub watchlist: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerSettings {
  pub symbol: String,
  pub rpc_server_type: RpcServerType,
  pub server_api: String,
  #[serde(default)]
  pub is_test_net: bool,
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  #[serde(default = "default_scan_mempool")]
  pub is_scan_mempool: bool,
  #[serde(default)]
  pub rescan_last_block_count: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
  pub db_path: String,
  pub blockchain_file: String,
}

fn default_interval_secs() -> u64 {
  10
}

fn default_scan_mempool() -> bool {
  true
}

impl Settings {
  pub fn new() -> Result<Self, config::ConfigError> {
    let default_config_path = "./config.toml";
    let env_prefix = "APP"; // E.g. APP_SCANNER__SERVER_API=... overrides the file value

    let builder = config::Config::builder()
      .add_source(config::File::with_name(default_config_path).required(true))
      .add_source(config::Environment::with_prefix(env_prefix).separator("__"));

    builder.build()?.try_deserialize()
  }
}
