mod memory;
mod rocksdb;
mod r#trait;

// StateStore trait
pub use r#trait::{StateStore, UnscanRecord};

// Store implementations
pub use memory::MemoryStore;
pub use rocksdb::RocksStore;
