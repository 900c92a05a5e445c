//! Shrinks photos that would not fit under the server's upload ceiling.
//!
//! Files at or under the ceiling go out untouched. Anything larger is fitted into a
//! bounding box and re-encoded as JPEG, stepping the quality down by 30% each pass
//! until it fits or the quality floor is hit. The last attempt is used either way.

use std::{io::Cursor, path::Path};

use carton::MAX_UPLOAD_BYTES;
use image::{ImageFormat, RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use tracing::info;

use crate::error::ClientError;

#[derive(Clone, Debug)]
pub struct CompressionOptions {
    pub max_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
    pub min_quality: u8,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            max_width: 1920,
            max_height: 1920,
            quality: 80,
            min_quality: 30,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PreparedUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub compressed: bool,
}

fn content_type(filename: &str) -> String {
    ImageFormat::from_path(filename)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ClientError> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(image)?;

    Ok(buffer.into_inner())
}

pub fn prepare_upload(
    filename: &str,
    bytes: Vec<u8>,
    options: &CompressionOptions,
) -> Result<PreparedUpload, ClientError> {
    if bytes.len() <= options.max_bytes {
        return Ok(PreparedUpload {
            filename: filename.to_string(),
            content_type: content_type(filename),
            bytes,
            compressed: false,
        });
    }

    let mut image = image::load_from_memory(&bytes)?;
    if image.width() > options.max_width || image.height() > options.max_height {
        image = image.resize(options.max_width, options.max_height, FilterType::Lanczos3);
    }
    let rgb = image.to_rgb8();

    let mut quality = options.quality;
    let mut encoded = encode_jpeg(&rgb, quality)?;

    while encoded.len() > options.max_bytes {
        let next = (u32::from(quality) * 7 / 10) as u8;
        if next < options.min_quality {
            break;
        }

        quality = next;
        encoded = encode_jpeg(&rgb, quality)?;
    }

    info!(
        "Compressed {filename} from {} to {} bytes at quality {quality}",
        bytes.len(),
        encoded.len()
    );

    let filename = Path::new(filename)
        .with_extension("jpg")
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image.jpg")
        .to_string();

    Ok(PreparedUpload {
        filename,
        bytes: encoded,
        content_type: "image/jpeg".to_string(),
        compressed: true,
    })
}
