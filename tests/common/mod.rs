#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{sleep, Duration};

use qtum_scanner::chain::gateway::{ChainGateway, RpcServerType};
use qtum_scanner::chain::model::{AddressBalance, Block, BlockHeader, Transaction, Vin, Vout};
use qtum_scanner::config::ScannerSettings;
use qtum_scanner::extractor::types::{ExtractData, ScanAddressFunc};
use qtum_scanner::notification::observer::BlockScanObserver;
use qtum_scanner::scanner::BlockScanner;
use qtum_scanner::store::MemoryStore;
use qtum_scanner::types::AppError;

/// Programmable in-memory chain backend.
#[derive(Default)]
pub struct MockChain {
  pub tip: RwLock<u64>,
  pub hashes: RwLock<HashMap<u64, String>>,
  pub blocks: RwLock<HashMap<String, Block>>,
  pub txs: RwLock<HashMap<String, Transaction>>,
  pub mempool: RwLock<Vec<String>>,
  pub push_txids: Mutex<Vec<String>>,
  pub failing_txs: RwLock<HashSet<String>>,
  pub tx_delays_ms: RwLock<HashMap<String, u64>>,

  pub active_fetches: AtomicUsize,
  pub max_active_fetches: AtomicUsize,
  pub completion_order: Mutex<Vec<String>>,
}

impl MockChain {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn add_block(&self, block: Block) {
    let mut tip = self.tip.write().await;
    if block.height > *tip {
      *tip = block.height;
    }
    self.hashes.write().await.insert(block.height, block.hash.clone());
    self.blocks.write().await.insert(block.hash.clone(), block);
  }

  pub async fn add_tx(&self, tx: Transaction) {
    self.txs.write().await.insert(tx.txid.clone(), tx);
  }

  pub async fn set_tip(&self, height: u64) {
    *self.tip.write().await = height;
  }

  pub async fn set_failing(&self, txid: &str) {
    self.failing_txs.write().await.insert(txid.to_string());
  }

  pub async fn clear_failing(&self, txid: &str) {
    self.failing_txs.write().await.remove(txid);
  }

  pub async fn set_delay(&self, txid: &str, millis: u64) {
    self.tx_delays_ms.write().await.insert(txid.to_string(), millis);
  }

  pub async fn queue_push(&self, txid: &str) {
    self.push_txids.lock().await.push(txid.to_string());
  }
}

#[async_trait]
impl ChainGateway for MockChain {
  async fn get_block_height(&self) -> Result<u64, AppError> {
    Ok(*self.tip.read().await)
  }

  async fn get_block_hash(&self, height: u64) -> Result<String, AppError> {
    self
      .hashes
      .read()
      .await
      .get(&height)
      .cloned()
      .ok_or_else(|| AppError::NotFound(format!("[-8]Block height out of range: {}", height)))
  }

  async fn get_block(&self, hash: &str) -> Result<Block, AppError> {
    self
      .blocks
      .read()
      .await
      .get(hash)
      .cloned()
      .ok_or_else(|| AppError::NotFound(format!("[-5]Block not found: {}", hash)))
  }

  async fn get_transaction(&self, txid: &str) -> Result<Transaction, AppError> {
    let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_active_fetches.fetch_max(active, Ordering::SeqCst);

    let delay = self.tx_delays_ms.read().await.get(txid).copied().unwrap_or(0);
    if delay > 0 {
      sleep(Duration::from_millis(delay)).await;
    }

    let result = if self.failing_txs.read().await.contains(txid) {
      Err(AppError::Client(format!("connection reset while fetching {}", txid)))
    } else {
      self
        .txs
        .read()
        .await
        .get(txid)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("[-5]No information available about transaction {}", txid)))
    };

    self.active_fetches.fetch_sub(1, Ordering::SeqCst);
    if result.is_ok() {
      self.completion_order.lock().await.push(txid.to_string());
    }
    result
  }

  async fn get_tx_out(&self, txid: &str, vout: u32) -> Result<Vout, AppError> {
    let trx = self.get_transaction(txid).await?;
    trx
      .vouts
      .into_iter()
      .find(|v| v.n == vout)
      .ok_or_else(|| AppError::NotFound(format!("[-5]vout {} of {} not found", vout, txid)))
  }

  async fn get_mempool_tx_ids(&self) -> Result<Vec<String>, AppError> {
    Ok(self.mempool.read().await.clone())
  }

  async fn get_balance_by_address(&self, _addresses: &[String]) -> Result<Vec<AddressBalance>, AppError> {
    Err(AppError::Client("balance query not wired in the mock".to_string()))
  }

  async fn get_transactions_by_address(
    &self,
    offset: u32,
    limit: u32,
    addresses: &[String],
  ) -> Result<Vec<Transaction>, AppError> {
    let wanted: HashSet<&String> = addresses.iter().collect();
    let mut matched: Vec<Transaction> = self
      .txs
      .read()
      .await
      .values()
      .filter(|tx| {
        tx.vouts.iter().any(|v| wanted.contains(&v.addr))
          || tx.vins.iter().any(|v| wanted.contains(&v.addr))
      })
      .cloned()
      .collect();
    matched.sort_by(|a, b| a.txid.cmp(&b.txid));

    Ok(
      matched
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect(),
    )
  }

  async fn subscribe_mempool(
    &self,
    txid_tx: Sender<String>,
    mut stop_rx: watch::Receiver<bool>,
  ) -> Result<(), AppError> {
    let queued: Vec<String> = self.push_txids.lock().await.drain(..).collect();
    for txid in queued {
      if txid_tx.send(txid).await.is_err() {
        return Ok(());
      }
    }
    let _ = stop_rx.changed().await;
    Ok(())
  }
}

/// Observer recording every delivery, with a switch to make extract-data
/// notifications fail.
#[derive(Default)]
pub struct RecordingObserver {
  pub headers: Mutex<Vec<BlockHeader>>,
  pub extracts: Mutex<Vec<(String, ExtractData)>>,
  pub fail_extract_notify: AtomicBool,
}

impl RecordingObserver {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl BlockScanObserver for RecordingObserver {
  async fn new_block_notify(&self, header: &BlockHeader) -> Result<(), AppError> {
    self.headers.lock().await.push(header.clone());
    Ok(())
  }

  async fn block_extract_data_notify(&self, source_key: &str, data: &ExtractData) -> Result<(), AppError> {
    if self.fail_extract_notify.load(Ordering::SeqCst) {
      return Err(AppError::Scan("observer rejected extract data".to_string()));
    }
    self.extracts.lock().await.push((source_key.to_string(), data.clone()));
    Ok(())
  }
}

pub fn test_settings() -> ScannerSettings {
  ScannerSettings {
    symbol: "QTUM".to_string(),
    rpc_server_type: RpcServerType::Core,
    server_api: "http://127.0.0.1:3889".to_string(),
    is_test_net: true,
    interval_secs: 60,
    is_scan_mempool: false,
    rescan_last_block_count: 0,
  }
}

pub fn block(height: u64, hash: &str, prev: &str, txids: &[&str]) -> Block {
  Block {
    hash: hash.to_string(),
    height,
    previous_block_hash: prev.to_string(),
    time: 1_700_000_000 + height,
    tx: txids.iter().map(|t| t.to_string()).collect(),
  }
}

/// Transaction with resolved vin addresses, explorer style.
pub fn coin_tx(
  txid: &str,
  height: u64,
  block_hash: &str,
  vins: &[(&str, &str)],
  vouts: &[(&str, &str)],
) -> Transaction {
  Transaction {
    txid: txid.to_string(),
    block_height: height,
    block_hash: block_hash.to_string(),
    blocktime: 1_700_000_000 + height,
    confirmations: 1,
    vins: vins
      .iter()
      .enumerate()
      .map(|(i, (addr, value))| Vin {
        txid: format!("{}-prev-{}", txid, i),
        vout: 0,
        addr: addr.to_string(),
        value: value.to_string(),
        coinbase: None,
      })
      .collect(),
    vouts: vouts
      .iter()
      .enumerate()
      .map(|(n, (addr, value))| Vout {
        n: n as u32,
        value: value.to_string(),
        addr: addr.to_string(),
        script_pub_key: format!("76a914{}88ac", n),
      })
      .collect(),
    is_qrc20_transfer: false,
    token_receipts: Vec::new(),
  }
}

/// Scan-address lookup over a fixed (address, source key) table.
pub fn watchlist(entries: &[(&str, &str)]) -> ScanAddressFunc {
  let table: HashMap<String, String> = entries
    .iter()
    .map(|(addr, key)| (addr.to_string(), key.to_string()))
    .collect();
  Arc::new(move |addr: &str| table.get(addr).cloned())
}

pub fn new_scanner(
  chain: Arc<MockChain>,
  store: Arc<MemoryStore>,
  scan_address: ScanAddressFunc,
) -> Arc<BlockScanner> {
  new_scanner_with_settings(chain, store, scan_address, test_settings())
}

pub fn new_scanner_with_settings(
  chain: Arc<MockChain>,
  store: Arc<MemoryStore>,
  scan_address: ScanAddressFunc,
  settings: ScannerSettings,
) -> Arc<BlockScanner> {
  Arc::new(BlockScanner::new(chain, store, &settings, scan_address))
}
