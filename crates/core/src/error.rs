use thiserror::Error;

/// The only message a client sees when recognition fails. Engine detail
/// stays in the logs.
pub const OCR_FAILURE_MESSAGE: &str = "Failed to process image";

/// Caller-facing failure of a scan. Zero extracted transactions is not an
/// error; it is an empty result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Missing or empty image payload. Raised before recognition starts.
    #[error("{0}")]
    InvalidInput(String),
    /// The recognition step failed. No partial text is returned.
    #[error("{0}")]
    OcrFailure(String),
}

impl ScanError {
    pub fn ocr_failure() -> Self {
        ScanError::OcrFailure(OCR_FAILURE_MESSAGE.to_string())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ScanError::InvalidInput(_))
    }
}
