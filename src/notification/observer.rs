use async_trait::async_trait;
use log::info;

use crate::chain::model::BlockHeader;
use crate::extractor::types::ExtractData;
use crate::types::AppError;

/// Downstream consumer of scan events. Registered on the scanner, called
/// from the save task; implementations must tolerate out-of-txid-order
/// delivery within a block.
#[async_trait]
pub trait BlockScanObserver: Send + Sync {
    /// New (or orphaned, `header.fork == true`) block on the local chain.
    async fn new_block_notify(&self, header: &BlockHeader) -> Result<(), AppError>;

    /// One per-account extract bundle. `source_key` is the account grouping
    /// returned by the scan-address lookup.
    async fn block_extract_data_notify(&self, source_key: &str, data: &ExtractData) -> Result<(), AppError>;
}

/// Observer that only writes to the log, the default wiring of the binary.
pub struct LoggingObserver;

#[async_trait]
impl BlockScanObserver for LoggingObserver {
    async fn new_block_notify(&self, header: &BlockHeader) -> Result<(), AppError> {
        if header.fork {
            info!("[Observer] ⚠️ fork block #{} hash: {}", header.height, header.hash);
        } else {
            info!("[Observer] new block #{} hash: {}", header.height, header.hash);
        }
        Ok(())
    }

    async fn block_extract_data_notify(&self, source_key: &str, data: &ExtractData) -> Result<(), AppError> {
        for output in &data.tx_outputs {
            info!(
                "[DEPOSIT] ✅ 입금 감지! account: {} | 주소: {} | 금액: {} | tx: {}",
                source_key, output.address, output.amount, output.txid
            );
        }
        for input in &data.tx_inputs {
            info!(
                "[WITHDRAW] account: {} | 주소: {} | 금액: {} | tx: {}",
                source_key, input.address, input.amount, input.txid
            );
        }
        Ok(())
    }
}
