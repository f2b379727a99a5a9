/**
* filename : client
* author : HAMA
* date: 2025. 5. 13.
* description:
**/

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::chain::explorer::model::{
  ExplorerAddrTxs, ExplorerBlock, ExplorerBlockIndex, ExplorerStatus, ExplorerTransaction,
  ExplorerUtxo, MempoolEvent,
};
use crate::chain::gateway::ChainGateway;
use crate::chain::model::{AddressBalance, Block, Transaction, Vout};
use crate::types::AppError;
use crate::utils::fixed8;

const RECONNECT_WAIT_SECS: u64 = 5;
const MEMPOOL_ROOM: &str = "inv";

/// insight-api HTTP client, plus the websocket push channel for mempool
/// transactions.
#[derive(Clone)]
pub struct ExplorerClient {
  client: Client,
  api_url: String,
}

impl ExplorerClient {
  pub fn new(api_url: String) -> Self {
    Self {
      client: Client::new(),
      api_url: api_url.trim_end_matches('/').to_string(),
    }
  }

  async fn fetch_json<T>(&self, path: &str) -> Result<T, AppError>
  where
    T: DeserializeOwned,
  {
    let url = format!("{}{}", self.api_url, path);
    let response = self.client.get(&url).send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Err(AppError::NotFound(format!("[404]{} not found", path)));
    }

    Ok(response.error_for_status()?.json::<T>().await?)
  }

  fn websocket_url(&self) -> Result<String, AppError> {
    let url = reqwest::Url::parse(&self.api_url)
      .map_err(|e| AppError::Config(format!("invalid server_api url: {}", e)))?;

    let scheme = match url.scheme() {
      "https" => "wss",
      _ => "ws",
    };
    let host = url
      .host_str()
      .ok_or_else(|| AppError::Config("server_api url has no host".to_string()))?;

    Ok(match url.port() {
      Some(port) => format!("{}://{}:{}/", scheme, host, port),
      None => format!("{}://{}/", scheme, host),
    })
  }

  /// One websocket session. Returns Ok(true) when the stop signal fired,
  /// Ok(false) on a server-side disconnect.
  async fn listen_mempool_once(
    &self,
    ws_url: &str,
    txid_tx: &Sender<String>,
    stop_rx: &mut watch::Receiver<bool>,
  ) -> Result<bool, AppError> {
    let (stream, _) = connect_async(ws_url).await?;
    let (mut write, mut read) = stream.split();

    info!("[MempoolListener] 웹소켓 연결 성공, room 구독 중: {}", MEMPOOL_ROOM);
    let subscribe = json!({ "event": "subscribe", "room": MEMPOOL_ROOM });
    write.send(Message::Text(subscribe.to_string())).await?;

    loop {
      tokio::select! {
        _ = stop_rx.changed() => {
          return Ok(true);
        }
        msg = read.next() => {
          match msg {
            Some(Ok(Message::Text(text))) => {
              let event: MempoolEvent = match serde_json::from_str(&text) {
                Ok(ev) => ev,
                Err(_) => continue,
              };
              if event.event == "tx" && !event.data.txid.is_empty() {
                if txid_tx.send(event.data.txid).await.is_err() {
                  // consumer is gone, treat as stop
                  return Ok(true);
                }
              }
            }
            Some(Ok(Message::Close(_))) | None => return Ok(false),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
          }
        }
      }
    }
  }
}

#[async_trait]
impl ChainGateway for ExplorerClient {
  async fn get_block_height(&self) -> Result<u64, AppError> {
    let status: ExplorerStatus = self.fetch_json("/status?q=getInfo").await?;
    Ok(status.info.blocks)
  }

  async fn get_block_hash(&self, height: u64) -> Result<String, AppError> {
    let index: ExplorerBlockIndex = self.fetch_json(&format!("/block-index/{}", height)).await?;
    Ok(index.block_hash)
  }

  async fn get_block(&self, hash: &str) -> Result<Block, AppError> {
    let raw: ExplorerBlock = self.fetch_json(&format!("/block/{}", hash)).await?;
    Ok(raw.into())
  }

  async fn get_transaction(&self, txid: &str) -> Result<Transaction, AppError> {
    let raw: ExplorerTransaction = self.fetch_json(&format!("/tx/{}", txid)).await?;
    Ok(raw.into())
  }

  async fn get_tx_out(&self, txid: &str, vout: u32) -> Result<Vout, AppError> {
    let trx = self.get_transaction(txid).await?;
    trx
      .vouts
      .into_iter()
      .find(|v| v.n == vout)
      .ok_or_else(|| AppError::NotFound(format!("[404]vout {} of {} not found", vout, txid)))
  }

  async fn get_mempool_tx_ids(&self) -> Result<Vec<String>, AppError> {
    // the push subscription is the explorer's mempool channel
    Err(AppError::Client(
      "mempool query is not supported by the explorer backend".to_string(),
    ))
  }

  async fn get_balance_by_address(&self, addresses: &[String]) -> Result<Vec<AddressBalance>, AppError> {
    let mut balances = Vec::with_capacity(addresses.len());

    for address in addresses {
      let utxos: Vec<ExplorerUtxo> = self.fetch_json(&format!("/addr/{}/utxo", address)).await?;

      let mut confirmed = Decimal::ZERO;
      let mut unconfirmed = Decimal::ZERO;
      for utxo in &utxos {
        let amount = Decimal::from_f64_retain(utxo.amount).unwrap_or(Decimal::ZERO);
        if utxo.confirmations > 0 {
          confirmed += amount;
        } else {
          unconfirmed += amount;
        }
      }

      balances.push(AddressBalance {
        address: address.clone(),
        balance: fixed8(confirmed),
        unconfirmed_balance: fixed8(unconfirmed),
      });
    }

    Ok(balances)
  }

  async fn get_transactions_by_address(
    &self,
    offset: u32,
    limit: u32,
    addresses: &[String],
  ) -> Result<Vec<Transaction>, AppError> {
    let url = format!("{}/addrs/txs", self.api_url);
    let payload = json!({
      "addrs": addresses.join(","),
      "from": offset,
      "to": offset + limit,
    });

    let response: ExplorerAddrTxs = self
      .client
      .post(&url)
      .json(&payload)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(response.items.into_iter().map(Transaction::from).collect())
  }

  async fn subscribe_mempool(
    &self,
    txid_tx: Sender<String>,
    mut stop_rx: watch::Receiver<bool>,
  ) -> Result<(), AppError> {
    let ws_url = self.websocket_url()?;
    info!("[MempoolListener] block scanner use websocket to listen new mempool data");

    loop {
      if *stop_rx.borrow() {
        return Ok(());
      }

      match self.listen_mempool_once(&ws_url, &txid_tx, &mut stop_rx).await {
        Ok(true) => {
          info!("[MempoolListener] stopped");
          return Ok(());
        }
        Ok(false) => {
          info!("[MempoolListener] websocket disconnected");
        }
        Err(e) => {
          warn!("[MempoolListener] websocket failed: {}", e);
        }
      }

      info!("[MempoolListener] auto reconnect after {} seconds...", RECONNECT_WAIT_SECS);
      tokio::select! {
        _ = sleep(Duration::from_secs(RECONNECT_WAIT_SECS)) => {}
        _ = stop_rx.changed() => return Ok(()),
      }
    }
  }
}
