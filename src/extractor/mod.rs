pub mod extractor;
pub mod ids;
pub mod types;

pub use extractor::TransactionExtractor;
pub use types::{ExtractData, ExtractResult, ScanAddressFunc};
