//! Vision model adapter
//!
//! Turns one rendered page image into structured table content through a
//! single request to a vision-capable chat model.

mod openai;

pub use openai::OpenAiClient;

use crate::error::{Error, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// Instruction sent alongside every table page image
pub const TABLE_EXTRACTION_PROMPT: &str = "\
Your task is to analyze and extract data from this table with absolute precision. Follow these steps:

1. First identify and analyze:
- All header levels and their relationships
- The type of data in each column (text, numbers, percentages, etc.)
- Any special formatting or highlighted elements
- Empty cell representations (-, N/A, blank, etc.)

2. For data extraction:
- Keep numbers exactly as they appear, including all formatting
- Maintain the exact column-value relationships by tracing each value to its header
- Preserve any cell's special formatting or emphasis
- Report empty cells consistently
- Maintain the original position of each value

3. Before finalizing:
- Verify each value is under its correct column by tracing back to headers
- Check that the data types match their respective columns
- Confirm no values have shifted between columns

Return the data in a JSON structure that preserves the table's hierarchy and relationships.";

/// Extracts structured content from a page image.
///
/// Implementations make exactly one attempt per call and do not cache.
pub trait StructuredImageExtractor {
    /// Returns the model's reported content for the image as a JSON string
    /// holding the exact message text
    fn extract_table_from_image(&self, image: &DynamicImage, model: &str)
        -> Result<serde_json::Value>;
}

impl<T: StructuredImageExtractor + ?Sized> StructuredImageExtractor for &T {
    fn extract_table_from_image(
        &self,
        image: &DynamicImage,
        model: &str,
    ) -> Result<serde_json::Value> {
        (**self).extract_table_from_image(image, model)
    }
}

/// Encode an image as a base64 JPEG data URL
pub fn image_to_data_url(image: &DynamicImage, quality: u8) -> Result<String> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut jpeg_bytes = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg_bytes, quality))
        .map_err(|e| Error::ModelRequest {
            reason: format!("Failed to encode page image as JPEG: {}", e),
        })?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg_bytes);
    Ok(format!("data:image/jpeg;base64,{}", encoded))
}
