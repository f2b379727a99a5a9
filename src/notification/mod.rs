pub mod observer;

pub use observer::{BlockScanObserver, LoggingObserver};
