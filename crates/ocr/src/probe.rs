use image::ImageFormat;

use crate::recognizer::OcrError;

/// Identify the raster format from the leading bytes. Nothing is decoded or
/// altered; bytes that are not a known image format are rejected before the
/// engine is started.
pub fn sniff_format(data: &[u8]) -> Result<ImageFormat, OcrError> {
    image::guess_format(data).map_err(|e| OcrError::ImageDecode(e.to_string()))
}
