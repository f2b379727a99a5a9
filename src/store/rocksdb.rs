use async_trait::async_trait;
use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;

use crate::chain::model::Block;
use crate::store::r#trait::{StateStore, UnscanRecord};
use crate::types::AppError;

const CURSOR_HEIGHT_KEY: &str = "blockchain:blockHeight";
const CURSOR_HASH_KEY: &str = "blockchain:blockHash";
const BLOCK_PREFIX: &str = "block:";
const UNSCAN_PREFIX: &str = "unscan:";

/// RocksDB-backed store. One long-lived handle; cursor writes stay on the
/// scanner task so no extra serialization is needed.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(path_str: &str) -> Result<Self, AppError> {
        let path = Path::new(path_str);
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open(&opts, path).map_err(|e| {
            AppError::Initialization(format!("Failed to open RocksDB at '{}': {}", path_str, e))
        })?;

        Ok(Self { db })
    }

    // 고정폭 height 인코딩, prefix 스캔 순서 보장
    fn block_key(height: u64) -> String {
        format!("{}{:020}", BLOCK_PREFIX, height)
    }

    fn unscan_key(height: u64, txid: &str) -> String {
        format!("{}{:020}:{}", UNSCAN_PREFIX, height, txid)
    }

    fn unscan_height_prefix(height: u64) -> String {
        format!("{}{:020}:", UNSCAN_PREFIX, height)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, AppError> {
        let mut entries = Vec::new();
        let iter = self.db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key).to_string();
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value.to_vec()));
        }
        Ok(entries)
    }
}

#[async_trait]
impl StateStore for RocksStore {
    async fn get_cursor(&self) -> Result<(u64, String), AppError> {
        let height = match self.db.get(CURSOR_HEIGHT_KEY.as_bytes())? {
            Some(raw) => serde_json::from_slice::<u64>(&raw)?,
            None => 0,
        };
        let hash = match self.db.get(CURSOR_HASH_KEY.as_bytes())? {
            Some(raw) => serde_json::from_slice::<String>(&raw)?,
            None => String::new(),
        };
        Ok((height, hash))
    }

    async fn put_cursor(&self, height: u64, hash: &str) -> Result<(), AppError> {
        let mut batch = WriteBatch::default();
        batch.put(CURSOR_HEIGHT_KEY.as_bytes(), serde_json::to_vec(&height)?);
        batch.put(CURSOR_HASH_KEY.as_bytes(), serde_json::to_vec(&hash)?);
        self.db.write(batch)?;
        Ok(())
    }

    async fn put_cursor_and_block(&self, height: u64, hash: &str, block: &Block) -> Result<(), AppError> {
        let mut batch = WriteBatch::default();
        batch.put(CURSOR_HEIGHT_KEY.as_bytes(), serde_json::to_vec(&height)?);
        batch.put(CURSOR_HASH_KEY.as_bytes(), serde_json::to_vec(&hash)?);
        batch.put(Self::block_key(block.height).as_bytes(), serde_json::to_vec(block)?);
        self.db.write(batch)?;
        Ok(())
    }

    async fn put_block(&self, block: &Block) -> Result<(), AppError> {
        self.db
            .put(Self::block_key(block.height).as_bytes(), serde_json::to_vec(block)?)?;
        Ok(())
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Block, AppError> {
        match self.db.get(Self::block_key(height).as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(AppError::NotFound(format!("local block {} not found", height))),
        }
    }

    async fn insert_unscan(&self, record: &UnscanRecord) -> Result<(), AppError> {
        let key = Self::unscan_key(record.block_height, &record.txid);
        // (height, txid) 기준 멱등 저장
        if self.db.get(key.as_bytes())?.is_some() {
            return Ok(());
        }
        self.db.put(key.as_bytes(), serde_json::to_vec(record)?)?;
        Ok(())
    }

    async fn list_unscan(&self) -> Result<Vec<UnscanRecord>, AppError> {
        let mut records = Vec::new();
        for (_, value) in self.scan_prefix(UNSCAN_PREFIX)? {
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    async fn delete_unscan_by_height(&self, height: u64) -> Result<(), AppError> {
        let prefix = Self::unscan_height_prefix(height);
        let mut batch = WriteBatch::default();
        for (key, _) in self.scan_prefix(&prefix)? {
            batch.delete(key.as_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn delete_unscan_by_reason_prefix(&self, prefix: &str) -> Result<(), AppError> {
        let mut batch = WriteBatch::default();
        for (key, value) in self.scan_prefix(UNSCAN_PREFIX)? {
            let record: UnscanRecord = serde_json::from_slice(&value)?;
            if record.reason.starts_with(prefix) {
                batch.delete(key.as_bytes());
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}
