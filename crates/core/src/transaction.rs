use serde::{Deserialize, Serialize};

/// One line item pulled out of OCR text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The matched amount token exactly as it appeared, including the `$`.
    pub amount: String,
    /// Trimmed text preceding the amount on its source line.
    pub details: String,
}

impl TransactionRecord {
    pub fn new(amount: impl Into<String>, details: impl Into<String>) -> Self {
        Self { amount: amount.into(), details: details.into() }
    }

    /// `details` and `amount` joined by a single space, as shown in summaries.
    pub fn summary_line(&self) -> String {
        format!("{} {}", self.details, self.amount)
    }
}

/// Output of a single scan: records in source line order plus the OCR text
/// they were extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub transactions: Vec<TransactionRecord>,
    pub raw_text: String,
    /// Lowercase hex SHA-256 of the uploaded image, for log correlation only.
    #[serde(skip)]
    pub image_digest: String,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Rebuild a text block from the records, one `details amount` per line.
    /// Lossy: anything on a line besides the prefix and first amount is gone.
    pub fn summary_text(&self) -> String {
        self.transactions
            .iter()
            .map(TransactionRecord::summary_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
