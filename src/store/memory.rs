use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chain::model::Block;
use crate::store::r#trait::{StateStore, UnscanRecord};
use crate::types::AppError;

/// In-memory store, used by tests and for running without a database path.
/// 재시작하면 모든 데이터가 사라짐
#[derive(Clone, Default)]
pub struct MemoryStore {
    cursor: Arc<RwLock<(u64, String)>>,
    blocks: Arc<RwLock<HashMap<u64, Block>>>,
    // (height, txid) -> record, ordered like the rocksdb key layout
    unscan: Arc<RwLock<BTreeMap<(u64, String), UnscanRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_cursor(&self) -> Result<(u64, String), AppError> {
        Ok(self.cursor.read().await.clone())
    }

    async fn put_cursor(&self, height: u64, hash: &str) -> Result<(), AppError> {
        *self.cursor.write().await = (height, hash.to_string());
        Ok(())
    }

    async fn put_cursor_and_block(&self, height: u64, hash: &str, block: &Block) -> Result<(), AppError> {
        let mut cursor = self.cursor.write().await;
        let mut blocks = self.blocks.write().await;
        *cursor = (height, hash.to_string());
        blocks.insert(block.height, block.clone());
        Ok(())
    }

    async fn put_block(&self, block: &Block) -> Result<(), AppError> {
        self.blocks.write().await.insert(block.height, block.clone());
        Ok(())
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Block, AppError> {
        self.blocks
            .read()
            .await
            .get(&height)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("local block {} not found", height)))
    }

    async fn insert_unscan(&self, record: &UnscanRecord) -> Result<(), AppError> {
        let key = (record.block_height, record.txid.clone());
        let mut unscan = self.unscan.write().await;
        unscan.entry(key).or_insert_with(|| record.clone());
        Ok(())
    }

    async fn list_unscan(&self) -> Result<Vec<UnscanRecord>, AppError> {
        Ok(self.unscan.read().await.values().cloned().collect())
    }

    async fn delete_unscan_by_height(&self, height: u64) -> Result<(), AppError> {
        self.unscan.write().await.retain(|(h, _), _| *h != height);
        Ok(())
    }

    async fn delete_unscan_by_reason_prefix(&self, prefix: &str) -> Result<(), AppError> {
        self.unscan.write().await.retain(|_, r| !r.reason.starts_with(prefix));
        Ok(())
    }
}
