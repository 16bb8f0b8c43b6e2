//! Image decoding, PNG encoding, and temp-file staging.
//!
//! Uploads are accepted as JPEG or PNG only. Everything sent to a remote
//! Space is re-encoded as PNG.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::error::PipelineError;

/// Content types accepted for uploads.
pub const ACCEPTED_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

/// Map an upload content type to the image format it declares.
pub fn format_for_content_type(content_type: &str) -> Option<ImageFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

/// Decode uploaded bytes. Only JPEG and PNG content is accepted, whatever the
/// declared content type said.
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, String> {
    let format = image::guess_format(bytes)
        .map_err(|e| format!("Failed to load image: {}. Ensure it's a valid JPEG/PNG.", e))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(format!(
            "Unsupported image format {:?}. Upload a JPEG or PNG.",
            format
        ));
    }

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| format!("Failed to load image: {}. Ensure it's a valid JPEG/PNG.", e))?;
    info!("Loaded upload: {}x{} ({:?})", img.width(), img.height(), format);
    Ok(img)
}

/// Encode an image to PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// PNG-encode and base64 an image for inline display.
pub fn png_base64(img: &DynamicImage) -> Result<String, PipelineError> {
    Ok(STANDARD.encode(encode_png(img)?))
}

/// Write `img` to a fresh `.png` file in the OS temp dir.
///
/// The file is kept on disk; nothing in the crate removes it later.
pub fn write_staged_png(img: &DynamicImage) -> Result<PathBuf, PipelineError> {
    let bytes = encode_png(img)?;
    let mut file = tempfile::Builder::new()
        .prefix("toonmesh-")
        .suffix(".png")
        .tempfile()
        .map_err(PipelineError::Staging)?;
    file.write_all(&bytes).map_err(PipelineError::Staging)?;
    file.flush().map_err(PipelineError::Staging)?;
    let path = file
        .into_temp_path()
        .keep()
        .map_err(|e| PipelineError::Staging(e.error))?;
    debug!("Staged {} bytes to {:?}", bytes.len(), path);
    Ok(path)
}

/// `write_staged_png` on the blocking pool.
pub async fn stage_png(img: &DynamicImage) -> Result<PathBuf, PipelineError> {
    let img = img.clone();
    tokio::task::spawn_blocking(move || write_staged_png(&img))
        .await
        .map_err(task_failed)?
}

/// Decode an image file from disk.
pub fn read_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    let img = image::ImageReader::open(path)
        .map_err(PipelineError::Staging)?
        .with_guessed_format()
        .map_err(PipelineError::Staging)?
        .decode()?;
    Ok(img)
}

/// Open an image file returned by a remote call.
pub async fn open_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_image(&path))
        .await
        .map_err(task_failed)?
}

/// `png_base64` on the blocking pool.
pub async fn png_base64_blocking(img: DynamicImage) -> Result<String, PipelineError> {
    tokio::task::spawn_blocking(move || png_base64(&img))
        .await
        .map_err(task_failed)?
}

fn task_failed(e: tokio::task::JoinError) -> PipelineError {
    PipelineError::Task(format!("image task panicked: {}", e))
}
