use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use thiserror::Error;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

#[derive(Debug, Error, PartialEq)]
pub enum ImagePayloadError {
    #[error("image payload is empty")] Empty,
    #[error("invalid base64: {0}")] Base64(String),
    #[error("unsupported image format")] Unsupported,
}

/// The product photo the seller uploads once per image step.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub mime_type: &'static str,
    pub data: Bytes,
}

impl ReferenceImage {
    /// Accepts raw base64 or a `data:image/...;base64,` URL. The declared type is
    /// ignored; the format is sniffed from the bytes.
    pub fn from_base64(payload: &str) -> Result<Self, ImagePayloadError> {
        let encoded = strip_data_url(payload.trim());
        if encoded.is_empty() {
            return Err(ImagePayloadError::Empty);
        }
        let data = B64.decode(encoded).map_err(|e| ImagePayloadError::Base64(e.to_string()))?;
        let mime_type = sniff_mime(&data).ok_or(ImagePayloadError::Unsupported)?;
        Ok(Self { mime_type, data: Bytes::from(data) })
    }

    pub fn base64(&self) -> String {
        B64.encode(&self.data)
    }
}

/// A rendered marketing image for one image-plan slot.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub id: u32,
    pub mime_type: String,
    pub data: Bytes,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedImage {
    pub fn from_base64(id: u32, mime_type: &str, encoded: &str) -> Result<Self, ImagePayloadError> {
        let data = B64.decode(encoded.trim()).map_err(|e| ImagePayloadError::Base64(e.to_string()))?;
        if data.is_empty() {
            return Err(ImagePayloadError::Empty);
        }
        Ok(Self { id, mime_type: mime_type.to_string(), data: Bytes::from(data), generated_at: Utc::now() })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, B64.encode(&self.data))
    }
}

fn strip_data_url(payload: &str) -> &str {
    match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(";base64,").map(|(_, data)| data).unwrap_or(""),
        None => payload,
    }
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

/// Shortens long base64 strings for log lines.
pub fn preview(data: &str) -> String {
    match data.char_indices().nth(50) {
        Some((idx, _)) => format!("{}...[{} chars total]", &data[..idx], data.len()),
        None => data.to_string(),
    }
}
