use tokio::sync::mpsc::{Receiver, Sender};

use crate::extractor::types::ExtractResult;

// ====== Channel aliases ======
pub type ExtractSender = Sender<ExtractResult>;
pub type ExtractReceiver = Receiver<ExtractResult>;

// ====== Unified Error Type ======
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("RPC client error: {0}")]
  Client(String),

  /// Logical miss from the backend. Carries the upstream "[code]message"
  /// text untouched, the unscan ledger purge matches on it.
  #[error("{0}")]
  NotFound(String),

  #[error("Database error: {0}")]
  Database(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Block scan error: {0}")]
  Scan(String),

  #[error("Extract error: {0}")]
  Extract(String),

  #[error("Channel send error: {0}")]
  SendError(String),

  #[error("Task join error: {0}")]
  JoinError(#[from] tokio::task::JoinError),

  #[error("WebSocket error: {0}")]
  WebSocket(String),

  #[error("Initialization error: {0}")]
  Initialization(String),
}

impl AppError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, AppError::NotFound(_))
  }
}

// ====== Error Conversions (From impls) ======

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::Client(format!("Reqwest error: {}", err))
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::Client(format!("JSON parse error: {}", err))
  }
}

impl From<rocksdb::Error> for AppError {
  fn from(err: rocksdb::Error) -> Self {
    AppError::Database(format!("RocksDB error: {}", err))
  }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
  fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
    AppError::SendError(format!("Channel send failed: {}", err))
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::Initialization(format!("IO error: {}", err))
  }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
  fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
    AppError::WebSocket(format!("{}", err))
  }
}
