use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::chain::model::{Block, Transaction, Vin, Vout};
use crate::types::AppError;
use crate::utils::fixed8_from_f64;

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
  pub result: Option<T>,
  pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
  pub code: i64,
  pub message: String,
}

impl<T: DeserializeOwned> RpcResponse<T> {
  /// Unwraps the envelope. Code -5 is the node's "not found" family and is
  /// kept verbatim as "[code]message" for the unscan ledger purge.
  pub fn into_result(self, method: &str) -> Result<T, AppError> {
    if let Some(err) = self.error {
      let text = format!("[{}]{}", err.code, err.message);
      return if err.code == -5 {
        Err(AppError::NotFound(text))
      } else {
        Err(AppError::Client(format!("{} failed: {}", method, text)))
      };
    }
    self
      .result
      .ok_or_else(|| AppError::Client(format!("{} returned empty result", method)))
  }
}

#[derive(Debug, Deserialize)]
pub struct RawBlock {
  pub hash: String,
  pub height: u64,
  #[serde(default)]
  pub previousblockhash: String,
  pub time: u64,
  #[serde(default)]
  pub tx: Vec<String>,
}

impl From<RawBlock> for Block {
  fn from(raw: RawBlock) -> Self {
    Block {
      hash: raw.hash,
      height: raw.height,
      previous_block_hash: raw.previousblockhash,
      time: raw.time,
      tx: raw.tx,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RawTransaction {
  pub txid: String,
  #[serde(default)]
  pub blockhash: String,
  #[serde(default)]
  pub confirmations: u64,
  #[serde(default)]
  pub blocktime: u64,
  #[serde(default)]
  pub vin: Vec<RawVin>,
  #[serde(default)]
  pub vout: Vec<RawVout>,
}

impl From<RawTransaction> for Transaction {
  fn from(raw: RawTransaction) -> Self {
    Transaction {
      txid: raw.txid,
      // getrawtransaction does not carry a height, the scanner fills it in
      // from the block being processed.
      block_height: 0,
      block_hash: raw.blockhash,
      blocktime: raw.blocktime,
      confirmations: raw.confirmations,
      vins: raw.vin.into_iter().map(Vin::from).collect(),
      vouts: raw.vout.into_iter().map(Vout::from).collect(),
      is_qrc20_transfer: false,
      token_receipts: Vec::new(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RawVin {
  #[serde(default)]
  pub txid: String,
  #[serde(default)]
  pub vout: u32,
  #[serde(default)]
  pub coinbase: Option<String>,
}

impl From<RawVin> for Vin {
  fn from(raw: RawVin) -> Self {
    Vin {
      txid: raw.txid,
      vout: raw.vout,
      // core vins carry no address, the extractor resolves it through the
      // previous transaction.
      addr: String::new(),
      value: String::new(),
      coinbase: raw.coinbase,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RawVout {
  pub n: u32,
  pub value: f64,
  #[serde(rename = "scriptPubKey", default)]
  pub script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawScriptPubKey {
  #[serde(default)]
  pub hex: String,
  #[serde(default)]
  pub addresses: Vec<String>,
}

impl From<RawVout> for Vout {
  fn from(raw: RawVout) -> Self {
    Vout {
      n: raw.n,
      value: fixed8_from_f64(raw.value),
      addr: raw.script_pub_key.addresses.first().cloned().unwrap_or_default(),
      script_pub_key: raw.script_pub_key.hex,
    }
  }
}

/// gettxout result. The vout index is not echoed back, callers set it.
#[derive(Debug, Deserialize)]
pub struct RawTxOut {
  pub value: f64,
  #[serde(rename = "scriptPubKey", default)]
  pub script_pub_key: RawScriptPubKey,
}

impl RawTxOut {
  pub fn into_vout(self, n: u32) -> Vout {
    Vout {
      n,
      value: fixed8_from_f64(self.value),
      addr: self.script_pub_key.addresses.first().cloned().unwrap_or_default(),
      script_pub_key: self.script_pub_key.hex,
    }
  }
}
