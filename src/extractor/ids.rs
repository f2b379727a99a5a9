use sha2::{Digest, Sha256};

use crate::extractor::types::TransactionRecord;

// Deterministic record ids. Same inputs must always hash to the same id,
// downstream dedup relies on it.

fn digest_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

pub fn gen_tx_input_sid(txid: &str, symbol: &str, contract_id: &str, index: u64) -> String {
    digest_hex(&format!("input_{}_{}_{}_{}", txid, symbol, contract_id, index))
}

pub fn gen_tx_output_sid(txid: &str, symbol: &str, contract_id: &str, index: u64) -> String {
    digest_hex(&format!("output_{}_{}_{}_{}", txid, symbol, contract_id, index))
}

pub fn gen_contract_id(symbol: &str, contract_address: &str) -> String {
    digest_hex(&format!("contract_{}_{}", symbol, contract_address))
}

pub fn gen_transaction_wx_id(tx: &TransactionRecord) -> String {
    digest_hex(&format!("tx_{}_{}_{}", tx.txid, tx.coin.contract_id, tx.coin.symbol))
}
