pub mod error;
pub mod transaction;

pub use error::{ScanError, OCR_FAILURE_MESSAGE};
pub use transaction::{ExtractionResult, TransactionRecord};
