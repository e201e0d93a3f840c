pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod probe;
pub mod recognizer;

pub use extract::Extractor;
pub use hash::image_digest;
pub use pipeline::{PipelineConfig, PipelineError, ReceiptPipeline};
pub use probe::sniff_format;
pub use recognizer::{
    MockRecognizer, OcrBackend, OcrError, RecognizerConfig, UnavailableRecognizer,
};
#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
