// src/main.rs
/**
* author : HAMA
* date: 2025. 5. 16.
* description: Entry point for the QTUM deposit scanning service.
*/

mod shutdown;

use log::info;
use std::path::Path;
use std::sync::Arc;

use qtum_scanner::chain::core_rpc::CoreRpcClient;
use qtum_scanner::chain::explorer::ExplorerClient;
use qtum_scanner::chain::gateway::{ChainGateway, RpcServerType};
use qtum_scanner::config::Settings;
use qtum_scanner::extractor::types::ScanAddressFunc;
use qtum_scanner::notification::LoggingObserver;
use qtum_scanner::scanner::BlockScanner;
use qtum_scanner::store::RocksStore;
use qtum_scanner::types::AppError;

use crate::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
  // 1. Initialize logging
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  info!("Application starting...");

  // 2. Load configuration
  let settings = Settings::new().map_err(|e| AppError::Config(e.to_string()))?;
  info!("Configuration loaded.");

  // 3. Open the blockchain state store
  let db_path = Path::new(&settings.store.db_path).join(&settings.store.blockchain_file);
  let store = Arc::new(RocksStore::open(&db_path.to_string_lossy())?);
  info!("Opened blockchain store at {}", db_path.display());

  // 4. Select the chain gateway backend
  let gateway: Arc<dyn ChainGateway> = match settings.scanner.rpc_server_type {
    RpcServerType::Core => Arc::new(CoreRpcClient::new(settings.scanner.server_api.clone())),
    RpcServerType::Explorer => Arc::new(ExplorerClient::new(settings.scanner.server_api.clone())),
  };
  info!(
    "Using {:?} backend at {} (testnet: {})",
    settings.scanner.rpc_server_type, settings.scanner.server_api, settings.scanner.is_test_net
  );

  // 5. Build the scan-address lookup from the configured watchlist
  let watchlist = settings.watchlist.clone();
  let scan_address: ScanAddressFunc = Arc::new(move |addr: &str| watchlist.get(addr).cloned());
  info!(
    "Monitoring {} watched address(es) for {}",
    settings.watchlist.len(),
    settings.scanner.symbol
  );

  // 6. Create the scanner and register observers
  let scanner = Arc::new(BlockScanner::new(gateway, store, &settings.scanner, scan_address));
  scanner.register_observer(Arc::new(LoggingObserver)).await;

  // 7. Run until a shutdown signal arrives
  scanner.run().await?;

  shutdown_signal().await;
  info!("Shutdown signal received. Waiting for tasks to finish...");

  scanner.stop().await;
  info!("Application exited cleanly.");
  Ok(())
}
