use serde::Deserialize;

use crate::chain::model::{Block, TokenReceipt, Transaction, Vin, Vout};
use crate::utils::{fixed8, fixed8_from_f64, parse_amount};

#[derive(Debug, Deserialize)]
pub struct ExplorerStatus {
  pub info: ExplorerInfo,
}

#[derive(Debug, Deserialize)]
pub struct ExplorerInfo {
  pub blocks: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerBlockIndex {
  pub block_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplorerBlock {
  pub hash: String,
  pub height: u64,
  #[serde(default)]
  pub previousblockhash: String,
  pub time: u64,
  #[serde(default)]
  pub tx: Vec<String>,
}

impl From<ExplorerBlock> for Block {
  fn from(raw: ExplorerBlock) -> Self {
    Block {
      hash: raw.hash,
      height: raw.height,
      previous_block_hash: raw.previousblockhash,
      time: raw.time,
      tx: raw.tx,
    }
  }
}

/// insight-api transaction. Unconfirmed transactions report height -1.
#[derive(Debug, Deserialize)]
pub struct ExplorerTransaction {
  pub txid: String,
  #[serde(default)]
  pub blockhash: String,
  #[serde(default)]
  pub blockheight: i64,
  #[serde(default)]
  pub confirmations: u64,
  #[serde(default)]
  pub blocktime: u64,
  #[serde(default)]
  pub vin: Vec<ExplorerVin>,
  #[serde(default)]
  pub vout: Vec<ExplorerVout>,
  #[serde(rename = "isqrc20Transfer", default)]
  pub is_qrc20_transfer: bool,
  #[serde(rename = "qrc20TokenTransfers", default)]
  pub qrc20_token_transfers: Vec<ExplorerTokenTransfer>,
}

#[derive(Debug, Deserialize)]
pub struct ExplorerVin {
  #[serde(default)]
  pub txid: String,
  #[serde(default)]
  pub vout: u32,
  #[serde(default)]
  pub addr: Option<String>,
  #[serde(default)]
  pub value: f64,
  #[serde(default)]
  pub coinbase: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExplorerVout {
  pub n: u32,
  #[serde(default)]
  pub value: String,
  #[serde(rename = "scriptPubKey", default)]
  pub script_pub_key: ExplorerScriptPubKey,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExplorerScriptPubKey {
  #[serde(default)]
  pub hex: String,
  #[serde(default)]
  pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTokenTransfer {
  /// Token contract address.
  #[serde(default)]
  pub address: String,
  #[serde(default)]
  pub from: String,
  #[serde(default)]
  pub to: String,
  #[serde(default)]
  pub value: String,
}

impl From<ExplorerTransaction> for Transaction {
  fn from(raw: ExplorerTransaction) -> Self {
    let block_height = if raw.blockheight > 0 { raw.blockheight as u64 } else { 0 };
    let block_hash = raw.blockhash.clone();
    let txid = raw.txid.clone();

    let token_receipts = raw
      .qrc20_token_transfers
      .into_iter()
      .map(|t| TokenReceipt {
        tx_hash: txid.clone(),
        contract_address: t.address,
        from: t.from,
        to: t.to,
        amount: t.value,
        block_height,
        block_hash: block_hash.clone(),
      })
      .collect();

    Transaction {
      txid: raw.txid,
      block_height,
      block_hash: raw.blockhash,
      blocktime: raw.blocktime,
      confirmations: raw.confirmations,
      vins: raw
        .vin
        .into_iter()
        .map(|v| Vin {
          txid: v.txid,
          vout: v.vout,
          addr: v.addr.unwrap_or_default(),
          value: fixed8_from_f64(v.value),
          coinbase: v.coinbase,
        })
        .collect(),
      vouts: raw
        .vout
        .into_iter()
        .map(|v| Vout {
          n: v.n,
          value: fixed8(parse_amount(&v.value)),
          addr: v.script_pub_key.addresses.first().cloned().unwrap_or_default(),
          script_pub_key: v.script_pub_key.hex,
        })
        .collect(),
      is_qrc20_transfer: raw.is_qrc20_transfer,
      token_receipts,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ExplorerUtxo {
  pub address: String,
  #[serde(default)]
  pub amount: f64,
  #[serde(default)]
  pub confirmations: u64,
}

#[derive(Debug, Deserialize)]
pub struct ExplorerAddrTxs {
  #[serde(default)]
  pub items: Vec<ExplorerTransaction>,
}

/// Push payload from the "inv" room.
#[derive(Debug, Deserialize)]
pub struct MempoolEvent {
  pub event: String,
  #[serde(default)]
  pub data: MempoolEventData,
}

#[derive(Debug, Deserialize, Default)]
pub struct MempoolEventData {
  #[serde(default)]
  pub txid: String,
}
