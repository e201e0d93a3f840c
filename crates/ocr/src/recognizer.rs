use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

/// Characters the engine may emit. Biased toward amounts and short
/// merchant descriptions.
pub const DEFAULT_CHAR_WHITELIST: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$.,:-()/ ";

/// Engine settings handed to each backend instance. Nothing here is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub language: String,
    pub char_whitelist: String,
    pub preserve_interword_spaces: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            preserve_interword_spaces: true,
        }
    }
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

/// Stand-in used when the binary was built without an engine.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string (or a pre-set failure) without touching an engine.
/// Counts invocations so callers can assert the engine was never reached, and
/// records the most calls ever running at once.
#[derive(Debug, Default)]
pub struct MockRecognizer {
    pub text: String,
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { fail_with: Some(message.into()), ..Self::default() }
    }

    /// Sleep for `delay` inside `recognize`, simulating a slow engine.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `recognize` calls observed running concurrently.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(msg) => Err(OcrError::Engine(msg.clone())),
            None => Ok(self.text.clone()),
        }
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError, RecognizerConfig};
    use leptess::{LepTess, Variable};

    /// Tesseract through leptess. Every `recognize` call builds its own
    /// engine; the handle is dropped (and the native engine freed) when the
    /// call returns, on success or error.
    pub struct TesseractRecognizer {
        data_path: Option<String>,
        config: RecognizerConfig,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, config: RecognizerConfig) -> Self {
            Self { data_path, config }
        }

        fn engine(&self) -> Result<LepTess, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.config.language)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditCharWhitelist, &self.config.char_whitelist)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let preserve = if self.config.preserve_interword_spaces { "1" } else { "0" };
            lt.set_variable(Variable::PreserveInterwordSpaces, preserve)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(lt)
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = self.engine()?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("Coffee Shop $4.50\nRent payment $1200.00");
        assert_eq!(
            r.recognize(b"fake image data").unwrap(),
            "Coffee Shop $4.50\nRent payment $1200.00"
        );
    }

    #[test]
    fn mock_ignores_image_content_and_counts_calls() {
        let r = MockRecognizer::new("hello");
        assert_eq!(r.recognize(b"anything").unwrap(), "hello");
        assert_eq!(r.recognize(b"").unwrap(), "hello");
        assert_eq!(r.calls(), 2);
    }

    #[test]
    fn failing_mock_reports_engine_error() {
        let r = MockRecognizer::failing("worker crashed");
        let err = r.recognize(b"img").unwrap_err();
        assert!(matches!(err, OcrError::Engine(ref m) if m == "worker crashed"));
    }

    #[test]
    fn mock_tracks_overlapping_calls() {
        let r = std::sync::Arc::new(
            MockRecognizer::new("x").with_delay(Duration::from_millis(50)),
        );
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let r = std::sync::Arc::clone(&r);
                std::thread::spawn(move || r.recognize(b"img").unwrap())
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(r.calls(), 3);
        assert!(r.peak_in_flight() >= 1 && r.peak_in_flight() <= 3);

        let sequential = MockRecognizer::new("y");
        sequential.recognize(b"a").unwrap();
        sequential.recognize(b"b").unwrap();
        assert_eq!(sequential.peak_in_flight(), 1);
    }

    #[test]
    fn unavailable_backend_always_fails() {
        let r: Box<dyn OcrBackend> = Box::new(UnavailableRecognizer);
        assert!(matches!(r.recognize(b"img"), Err(OcrError::NotAvailable)));
    }

    #[test]
    fn default_config_biases_toward_financial_text() {
        let cfg = RecognizerConfig::default();
        assert_eq!(cfg.language, "eng");
        assert!(cfg.preserve_interword_spaces);
        for c in ['$', '.', ',', ':', '-', '(', ')', '/', ' ', '0', '9', 'a', 'Z'] {
            assert!(cfg.char_whitelist.contains(c), "missing {c:?}");
        }
        assert!(!cfg.char_whitelist.contains('€'));
        assert!(!cfg.char_whitelist.contains('\n'));
    }
}
