use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::model::Block;
use crate::types::AppError;

/// Record of a block or transaction the pipeline failed to process.
/// Identity is (block_height, txid); an empty txid marks the whole block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnscanRecord {
    pub block_height: u64,
    pub txid: String,
    pub reason: String,
}

impl UnscanRecord {
    pub fn new(block_height: u64, txid: &str, reason: &str) -> Self {
        Self {
            block_height,
            txid: txid.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// StateStore trait - 스캐너의 영속 상태를 추상화
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last durably scanned (height, hash). Zero values when empty.
    async fn get_cursor(&self) -> Result<(u64, String), AppError>;

    async fn put_cursor(&self, height: u64, hash: &str) -> Result<(), AppError>;

    /// Cursor update and block insert as one atomic write.
    async fn put_cursor_and_block(&self, height: u64, hash: &str, block: &Block) -> Result<(), AppError>;

    async fn put_block(&self, block: &Block) -> Result<(), AppError>;

    async fn get_block_by_height(&self, height: u64) -> Result<Block, AppError>;

    /// Idempotent on (block_height, txid).
    async fn insert_unscan(&self, record: &UnscanRecord) -> Result<(), AppError>;

    async fn list_unscan(&self) -> Result<Vec<UnscanRecord>, AppError>;

    async fn delete_unscan_by_height(&self, height: u64) -> Result<(), AppError>;

    /// Purge records whose reason starts with the given prefix, used for the
    /// "no information available about transaction" family.
    async fn delete_unscan_by_reason_prefix(&self, prefix: &str) -> Result<(), AppError>;
}
