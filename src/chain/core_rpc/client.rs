/**
* filename : client
* author : HAMA
* date: 2025. 5. 13.
* description:
**/

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;

use crate::chain::core_rpc::model::{RawBlock, RawTransaction, RawTxOut, RpcResponse};
use crate::chain::gateway::ChainGateway;
use crate::chain::model::{AddressBalance, Block, Transaction, Vout};
use crate::types::AppError;

/// JSON-RPC client for the core wallet node.
#[derive(Clone)]
pub struct CoreRpcClient {
  client: Client,
  api_url: String,
}

impl CoreRpcClient {
  pub fn new(api_url: String) -> Self {
    Self {
      client: Client::new(),
      api_url,
    }
  }

  async fn call<T>(&self, method: &str, params: serde_json::Value) -> Result<T, AppError>
  where
    T: DeserializeOwned,
  {
    let payload = json!({
      "jsonrpc": "2.0",
      "method": method,
      "params": params,
      "id": 1
    });

    let response: RpcResponse<T> = self
      .client
      .post(&self.api_url)
      .json(&payload)
      .send()
      .await?
      .json()
      .await?;

    response.into_result(method)
  }
}

#[async_trait]
impl ChainGateway for CoreRpcClient {
  async fn get_block_height(&self) -> Result<u64, AppError> {
    self.call("getblockcount", json!([])).await
  }

  async fn get_block_hash(&self, height: u64) -> Result<String, AppError> {
    self.call("getblockhash", json!([height])).await
  }

  async fn get_block(&self, hash: &str) -> Result<Block, AppError> {
    let raw: RawBlock = self.call("getblock", json!([hash])).await?;
    Ok(raw.into())
  }

  async fn get_transaction(&self, txid: &str) -> Result<Transaction, AppError> {
    let raw: RawTransaction = self.call("getrawtransaction", json!([txid, true])).await?;
    Ok(raw.into())
  }

  async fn get_tx_out(&self, txid: &str, vout: u32) -> Result<Vout, AppError> {
    let raw: RawTxOut = self.call("gettxout", json!([txid, vout])).await?;
    Ok(raw.into_vout(vout))
  }

  async fn get_mempool_tx_ids(&self) -> Result<Vec<String>, AppError> {
    self.call("getrawmempool", json!([])).await
  }

  async fn get_balance_by_address(&self, _addresses: &[String]) -> Result<Vec<AddressBalance>, AppError> {
    Err(AppError::Client(
      "address balance query is only supported by the explorer backend".to_string(),
    ))
  }

  async fn get_transactions_by_address(
    &self,
    _offset: u32,
    _limit: u32,
    _addresses: &[String],
  ) -> Result<Vec<Transaction>, AppError> {
    Err(AppError::Client(
      "address transaction query is only supported by the explorer backend".to_string(),
    ))
  }

  async fn subscribe_mempool(
    &self,
    _txid_tx: Sender<String>,
    _stop_rx: watch::Receiver<bool>,
  ) -> Result<(), AppError> {
    Err(AppError::Client(
      "mempool push is only supported by the explorer backend".to_string(),
    ))
  }
}
