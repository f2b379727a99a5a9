use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Address lookup injected by the caller. Returns the source key (account
/// grouping) when the address is watched.
pub type ScanAddressFunc = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Fail,
}

/// Coin identity stamped on every emitted record. For QRC20 records the
/// contract part is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    pub symbol: String,
    pub is_contract: bool,
    pub contract_id: String,
    pub contract: Option<SmartContract>,
}

impl Coin {
    pub fn native(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            is_contract: false,
            contract_id: String::new(),
            contract: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartContract {
    pub contract_id: String,
    pub address: String,
    pub protocol: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub source_txid: String,
    pub source_index: u32,
    pub txid: String,
    pub address: String,
    pub amount: String,
    pub coin: Coin,
    pub index: u32,
    pub sid: String,
    pub create_at: i64,
    pub block_height: u64,
    pub block_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub txid: String,
    pub address: String,
    pub amount: String,
    pub coin: Coin,
    pub index: u32,
    pub sid: String,
    /// Extension fields, carries scriptPubKey for utxo replay.
    pub ext_param: HashMap<String, String>,
    pub create_at: i64,
    pub block_height: u64,
    pub block_hash: String,
    pub confirm: i64,
}

/// Synthesized per-account transaction summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub fees: String,
    pub coin: Coin,
    pub block_hash: String,
    pub block_height: u64,
    pub txid: String,
    pub decimals: u32,
    pub confirm_time: u64,
    pub status: TxStatus,
    pub wx_id: String,
}

/// Per-account bundle delivered to observers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractData {
    pub tx_inputs: Vec<TxInput>,
    pub tx_outputs: Vec<TxOutput>,
    pub transaction: Option<TransactionRecord>,
}

/// Outcome of extracting one transaction. Coin records and token records
/// are bucketed separately, both keyed by source key.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    pub txid: String,
    pub block_height: u64,
    pub extract_data: HashMap<String, ExtractData>,
    pub extract_contract_data: HashMap<String, ExtractData>,
    pub success: bool,
}

impl ExtractResult {
    pub fn new(block_height: u64, txid: &str) -> Self {
        Self {
            txid: txid.to_string(),
            block_height,
            extract_data: HashMap::new(),
            extract_contract_data: HashMap::new(),
            success: false,
        }
    }
}
