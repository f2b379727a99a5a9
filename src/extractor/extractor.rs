/**
* filename : extractor
* author : HAMA
* date: 2025. 5. 14.
* description: Projects fetched transactions into per-account deposit and
* withdrawal records for the watched address set.
**/

use chrono::Utc;
use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::chain::gateway::ChainGateway;
use crate::chain::model::Transaction;
use crate::extractor::ids::{gen_contract_id, gen_transaction_wx_id, gen_tx_input_sid, gen_tx_output_sid};
use crate::extractor::types::{
    Coin, ExtractResult, ScanAddressFunc, SmartContract, TransactionRecord, TxInput, TxOutput, TxStatus,
};
use crate::utils::{fixed8, parse_amount};

pub struct TransactionExtractor {
    gateway: Arc<dyn ChainGateway>,
    symbol: String,
}

impl TransactionExtractor {
    pub fn new(gateway: Arc<dyn ChainGateway>, symbol: &str) -> Self {
        Self {
            gateway,
            symbol: symbol.to_string(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Fetches one transaction and extracts both the native coin records and
    /// the QRC20 token records. Never fails, a failed result carries
    /// `success == false` and becomes an unscanned record upstream.
    pub async fn extract(
        &self,
        block_height: u64,
        block_hash: &str,
        txid: &str,
        scan_address: &ScanAddressFunc,
    ) -> ExtractResult {
        let mut result = ExtractResult::new(block_height, txid);

        let mut trx = match self.gateway.get_transaction(txid).await {
            Ok(trx) => trx,
            Err(e) => {
                info!("[Extractor] can not extract transaction data; unexpected error: {}", e);
                return result;
            }
        };

        // 전달받은 높이를 우선 사용
        if block_height > 0 && trx.block_height == 0 {
            trx.block_height = block_height;
            trx.block_hash = block_hash.to_string();
        }

        self.extract_coin(&mut trx, &mut result, scan_address).await;
        if result.success {
            self.extract_token_transfer(&trx, &mut result, scan_address);
        }

        result
    }

    /// Native coin pass. Resolves sourceless vins through the previous
    /// transaction first; one failed dereference fails the whole result.
    pub async fn extract_coin(
        &self,
        trx: &mut Transaction,
        result: &mut ExtractResult,
        scan_address: &ScanAddressFunc,
    ) {
        for vin in trx.vins.iter_mut() {
            if vin.is_coinbase() {
                continue;
            }

            if vin.addr.is_empty() {
                let prev = match self.gateway.get_transaction(&vin.txid).await {
                    Ok(prev) => prev,
                    Err(e) => {
                        info!("[Extractor] can not trace previous transaction {}; unexpected error: {}", vin.txid, e);
                        result.success = false;
                        return;
                    }
                };

                match prev.vouts.iter().find(|v| v.n == vin.vout) {
                    Some(out) => {
                        vin.addr = out.addr.clone();
                        vin.value = out.value.clone();
                    }
                    None => {
                        result.success = false;
                        return;
                    }
                }
            }
        }

        let (from, total_spent) = self.extract_tx_input(trx, result, scan_address);
        let (to, total_received) = self.extract_tx_output(trx, result, scan_address);

        for data in result.extract_data.values_mut() {
            let mut tx_record = TransactionRecord {
                from: from.clone(),
                to: to.clone(),
                fees: fixed8(total_spent - total_received),
                coin: Coin::native(&self.symbol),
                block_hash: trx.block_hash.clone(),
                block_height: trx.block_height,
                txid: trx.txid.clone(),
                decimals: 8,
                confirm_time: trx.blocktime,
                status: TxStatus::Success,
                wx_id: String::new(),
            };
            tx_record.wx_id = gen_transaction_wx_id(&tx_record);
            data.transaction = Some(tx_record);
        }

        result.success = true;
    }

    fn extract_tx_input(
        &self,
        trx: &Transaction,
        result: &mut ExtractResult,
        scan_address: &ScanAddressFunc,
    ) -> (Vec<String>, Decimal) {
        let mut from = Vec::new();
        let mut total_amount = Decimal::ZERO;
        let create_at = Utc::now().timestamp();

        for (i, vin) in trx.vins.iter().enumerate() {
            if let Some(source_key) = scan_address(&vin.addr) {
                let input = TxInput {
                    source_txid: vin.txid.clone(),
                    source_index: vin.vout,
                    txid: trx.txid.clone(),
                    address: vin.addr.clone(),
                    amount: vin.value.clone(),
                    coin: Coin::native(&self.symbol),
                    index: i as u32,
                    sid: gen_tx_input_sid(&vin.txid, &self.symbol, "", i as u64),
                    create_at,
                    block_height: trx.block_height,
                    block_hash: trx.block_hash.clone(),
                };

                result.extract_data.entry(source_key).or_default().tx_inputs.push(input);
            }

            from.push(format!("{}:{}", vin.addr, vin.value));
            total_amount += parse_amount(&vin.value);
        }

        (from, total_amount)
    }

    fn extract_tx_output(
        &self,
        trx: &Transaction,
        result: &mut ExtractResult,
        scan_address: &ScanAddressFunc,
    ) -> (Vec<String>, Decimal) {
        let mut to = Vec::new();
        let mut total_amount = Decimal::ZERO;
        let create_at = Utc::now().timestamp();

        for vout in &trx.vouts {
            if let Some(source_key) = scan_address(&vout.addr) {
                let mut output = TxOutput {
                    txid: trx.txid.clone(),
                    address: vout.addr.clone(),
                    amount: vout.value.clone(),
                    coin: Coin::native(&self.symbol),
                    index: vout.n,
                    sid: gen_tx_output_sid(&trx.txid, &self.symbol, "", vout.n as u64),
                    ext_param: Default::default(),
                    create_at,
                    block_height: trx.block_height,
                    block_hash: trx.block_hash.clone(),
                    confirm: trx.confirmations as i64,
                };
                // utxo 재구성용 확장 필드
                output.ext_param.insert("scriptPubKey".to_string(), vout.script_pub_key.clone());

                result.extract_data.entry(source_key).or_default().tx_outputs.push(output);
            }

            to.push(format!("{}:{}", vout.addr, vout.value));
            total_amount += parse_amount(&vout.value);
        }

        (to, total_amount)
    }

    /// QRC20 pass. A QTUM transaction currently carries at most one token
    /// transfer, the loop shape keeps parity with the receipt list anyway.
    pub fn extract_token_transfer(
        &self,
        trx: &Transaction,
        result: &mut ExtractResult,
        scan_address: &ScanAddressFunc,
    ) {
        if !trx.is_qrc20_transfer {
            return;
        }

        let create_at = Utc::now().timestamp();

        for receipt in &trx.token_receipts {
            let contract_id = gen_contract_id(&self.symbol, &receipt.contract_address);
            let coin = Coin {
                symbol: self.symbol.clone(),
                is_contract: true,
                contract_id: contract_id.clone(),
                contract: Some(SmartContract {
                    contract_id: contract_id.clone(),
                    address: receipt.contract_address.clone(),
                    protocol: "qrc20".to_string(),
                    symbol: self.symbol.clone(),
                }),
            };

            if let Some(source_key) = scan_address(&receipt.from) {
                let input = TxInput {
                    source_txid: String::new(),
                    source_index: 0,
                    txid: trx.txid.clone(),
                    address: receipt.from.clone(),
                    amount: receipt.amount.clone(),
                    coin: coin.clone(),
                    index: 0,
                    sid: gen_tx_input_sid(&receipt.tx_hash, &self.symbol, &contract_id, 0),
                    create_at,
                    block_height: receipt.block_height,
                    block_hash: receipt.block_hash.clone(),
                };

                result
                    .extract_contract_data
                    .entry(source_key)
                    .or_default()
                    .tx_inputs
                    .push(input);
            }

            if let Some(source_key) = scan_address(&receipt.to) {
                let mut output = TxOutput {
                    txid: trx.txid.clone(),
                    address: receipt.to.clone(),
                    amount: receipt.amount.clone(),
                    coin: coin.clone(),
                    index: 0,
                    sid: gen_tx_output_sid(&receipt.tx_hash, &self.symbol, &contract_id, 0),
                    ext_param: Default::default(),
                    create_at,
                    block_height: receipt.block_height,
                    block_hash: receipt.block_hash.clone(),
                    confirm: trx.confirmations as i64,
                };
                output.ext_param.insert("contractAddress".to_string(), receipt.contract_address.clone());

                result
                    .extract_contract_data
                    .entry(source_key)
                    .or_default()
                    .tx_outputs
                    .push(output);
            }

            for data in result.extract_contract_data.values_mut() {
                let mut tx_record = TransactionRecord {
                    from: vec![format!("{}:{}", receipt.from, receipt.amount)],
                    to: vec![format!("{}:{}", receipt.to, receipt.amount)],
                    fees: "0".to_string(),
                    coin: coin.clone(),
                    block_hash: receipt.block_hash.clone(),
                    block_height: receipt.block_height,
                    txid: receipt.tx_hash.clone(),
                    decimals: 0,
                    confirm_time: trx.blocktime,
                    status: TxStatus::Success,
                    wx_id: String::new(),
                };
                tx_record.wx_id = gen_transaction_wx_id(&tx_record);
                data.transaction = Some(tx_record);
            }
        }
    }
}
