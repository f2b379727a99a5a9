/**
* filename : model
* author : HAMA
* date: 2025. 5. 12.
* description:
**/

use serde::{Deserialize, Serialize};

/// 블록 헤더 (관찰자 통지용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
  pub height: u64,
  pub hash: String,
  pub previous_block_hash: String,
  pub time: u64,
  pub fork: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
  pub hash: String,
  pub height: u64,
  pub previous_block_hash: String,
  pub time: u64,
  pub tx: Vec<String>,
}

impl Block {
  pub fn header(&self) -> BlockHeader {
    BlockHeader {
      height: self.height,
      hash: self.hash.clone(),
      previous_block_hash: self.previous_block_hash.clone(),
      time: self.time,
      fork: false,
    }
  }
}

/// A fully fetched transaction. `block_height == 0` means the transaction
/// came from the mempool and is still unconfirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
  pub txid: String,
  pub block_height: u64,
  pub block_hash: String,
  pub blocktime: u64,
  pub confirmations: u64,
  pub vins: Vec<Vin>,
  pub vouts: Vec<Vout>,
  pub is_qrc20_transfer: bool,
  pub token_receipts: Vec<TokenReceipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vin {
  /// Previous transaction funding this input.
  pub txid: String,
  pub vout: u32,
  /// Empty until resolved against the previous vout for some backends.
  pub addr: String,
  pub value: String,
  pub coinbase: Option<String>,
}

impl Vin {
  pub fn is_coinbase(&self) -> bool {
    self.coinbase.as_deref().map_or(false, |c| !c.is_empty())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vout {
  pub n: u32,
  pub value: String,
  pub addr: String,
  pub script_pub_key: String,
}

/// QRC20 transfer receipt attached to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenReceipt {
  pub tx_hash: String,
  pub contract_address: String,
  pub from: String,
  pub to: String,
  pub amount: String,
  pub block_height: u64,
  pub block_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBalance {
  pub address: String,
  pub balance: String,
  pub unconfirmed_balance: String,
}
