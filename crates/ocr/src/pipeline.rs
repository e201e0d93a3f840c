use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tallyscan_core::{ExtractionResult, ScanError};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::extract::Extractor;
use crate::hash;
use crate::probe;
use crate::recognizer::{OcrBackend, OcrError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No image data provided")]
    EmptyInput,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("OCR recognition timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR worker stopped unexpectedly: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Collapse into the two caller-facing kinds. Recognition failures carry
    /// only the fixed opaque message; the detail is logged where it happens.
    pub fn into_scan_error(self) -> ScanError {
        match self {
            PipelineError::EmptyInput => ScanError::InvalidInput(self.to_string()),
            _ => ScanError::ocr_failure(),
        }
    }
}

impl From<PipelineError> for ScanError {
    fn from(e: PipelineError) -> Self {
        e.into_scan_error()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on a single recognition, engine start-up included.
    pub recognize_timeout: Duration,
    /// Number of recognitions allowed to run at once; the rest wait.
    pub max_concurrent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { recognize_timeout: Duration::from_secs(60), max_concurrent: 4 }
    }
}

/// Orchestrates: validate → hash → sniff format → OCR (bounded, timed) → extract.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    permits: Arc<Semaphore>,
    config: PipelineConfig,
}

impl<R: OcrBackend + 'static> ReceiptPipeline<R> {
    pub fn new(recognizer: R, config: PipelineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self { recognizer: Arc::new(recognizer), permits, config }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Process a file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ExtractionResult, PipelineError> {
        let bytes = tokio::fs::read(path)
            .await
            .inspect_err(|e| tracing::warn!(path = %path.display(), "Reading image failed: {e}"))?;
        self.process_bytes(&bytes).await
    }

    /// Process raw image bytes as received from the client.
    pub async fn process_bytes(&self, data: &[u8]) -> Result<ExtractionResult, PipelineError> {
        // 1. Reject empty payloads before any engine work.
        if data.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        // 2. Hash for log correlation.
        let image_digest = hash::image_digest(data);

        self.scan(data, image_digest.clone())
            .await
            .inspect_err(|e| tracing::warn!(digest = %image_digest, "Scan failed: {e}"))
    }

    async fn scan(&self, data: &[u8], image_digest: String) -> Result<ExtractionResult, PipelineError> {
        // 3. Make sure this is an image at all.
        let format = probe::sniff_format(data)?;
        tracing::debug!(digest = %image_digest, ?format, bytes = data.len(), "Image accepted");

        // 4. Run OCR.
        let started = Instant::now();
        let raw_text = self.recognize(data.to_vec()).await?;

        // 5. Extract line items.
        let transactions = Extractor::extract(&raw_text);
        tracing::info!(
            digest = %image_digest,
            transactions = transactions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Receipt processed"
        );

        Ok(ExtractionResult { transactions, raw_text, image_digest })
    }

    async fn recognize(&self, data: Vec<u8>) -> Result<String, PipelineError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("scan permits are never closed");

        // The permit travels with the blocking job, so a timed-out recognition
        // keeps its slot until the engine actually returns.
        let recognizer = Arc::clone(&self.recognizer);
        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            recognizer.recognize(&data)
        });

        let timeout = self.config.recognize_timeout;
        match tokio::time::timeout(timeout, job).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(PipelineError::Timeout(timeout)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
