/**
* filename : gateway
* author : HAMA
* date: 2025. 5. 12.
* description:
**/

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;

use crate::chain::model::{AddressBalance, Block, Transaction, Vout};
use crate::types::AppError;

/// Backend selector, set from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcServerType {
  Core,
  Explorer,
}

/// Uniform view over the core JSON-RPC node and the explorer HTTP API.
/// Every call is idempotent and uncached, retry policy belongs to callers.
#[async_trait]
pub trait ChainGateway: Send + Sync {
  async fn get_block_height(&self) -> Result<u64, AppError>;

  async fn get_block_hash(&self, height: u64) -> Result<String, AppError>;

  async fn get_block(&self, hash: &str) -> Result<Block, AppError>;

  async fn get_transaction(&self, txid: &str) -> Result<Transaction, AppError>;

  /// Output of a prior transaction, used to trace an input back to its source.
  async fn get_tx_out(&self, txid: &str, vout: u32) -> Result<Vout, AppError>;

  async fn get_mempool_tx_ids(&self) -> Result<Vec<String>, AppError>;

  /// Explorer-backed read path. The core backend answers with an error.
  async fn get_balance_by_address(&self, addresses: &[String]) -> Result<Vec<AddressBalance>, AppError>;

  /// Explorer-backed read path. The core backend answers with an error.
  async fn get_transactions_by_address(
    &self,
    offset: u32,
    limit: u32,
    addresses: &[String],
  ) -> Result<Vec<Transaction>, AppError>;

  /// Push subscription for new mempool txids. Forwards each txid into
  /// `txid_tx` until `stop_rx` flips, reconnecting on its own. Only the
  /// explorer backend supports this.
  async fn subscribe_mempool(
    &self,
    txid_tx: Sender<String>,
    stop_rx: watch::Receiver<bool>,
  ) -> Result<(), AppError>;
}
