//! Image format detection and encoding

use std::io::Cursor;
use std::path::Path;
use image::codecs::jpeg::JpegEncoder;
use image::error::{EncodingError, ImageFormatHint};
use image::{DynamicImage, ImageError, ImageFormat};

use crate::config::{OutputFormat, DEFAULT_QUALITY};

/// Extensions recognised as image inputs (compared case-insensitively)
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"];

/// Check if a file extension is supported for input
pub fn is_supported_input_format(extension: &str) -> bool {
    SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|&fmt| fmt.eq_ignore_ascii_case(extension))
}

/// Check if a path has a supported image extension
pub fn is_image_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_supported_input_format)
}

/// Encode an image into memory.
///
/// JPEG and WebP honour `quality`; PNG is always lossless. The image must
/// already be RGB8 or RGBA8.
pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: Option<u8>,
) -> image::ImageResult<Vec<u8>> {
    let quality = quality.unwrap_or(DEFAULT_QUALITY).clamp(1, 100);
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            image.write_with_encoder(encoder)?;
        }
        OutputFormat::Webp => {
            let encoder = webp::Encoder::from_image(image).map_err(|reason| {
                ImageError::Encoding(EncodingError::new(
                    ImageFormatHint::Exact(ImageFormat::WebP),
                    reason.to_string(),
                ))
            })?;
            buffer.extend_from_slice(&encoder.encode(f32::from(quality)));
        }
        OutputFormat::Png => {
            image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        }
    }

    Ok(buffer)
}
