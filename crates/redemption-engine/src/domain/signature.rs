//! # Signature Images
//!
//! Redeeming operators may attach a handwritten signature captured as a data
//! URL (`data:image/png;base64,...` or `data:image/jpeg;base64,...`). The
//! image is decoded here and handed to the blob store, which returns an
//! opaque handle that is linked from both the instance and the Redemption.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Supported signature encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension used by blob stores.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    fn from_mime_subtype(subtype: &str) -> Option<Self> {
        if subtype.eq_ignore_ascii_case("png") {
            Some(ImageFormat::Png)
        } else if subtype.eq_ignore_ascii_case("jpeg") {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature is not a data:image/(png|jpeg);base64 URL")]
    MalformedDataUrl,

    #[error("signature payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("signature payload is empty")]
    Empty,
}

/// A decoded signature image.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SignatureImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl SignatureImage {
    /// Parses `data:image/<png|jpeg>;base64,<payload>`.
    ///
    /// The scheme and MIME type are matched case-insensitively.
    pub fn from_data_url(url: &str) -> Result<Self, SignatureError> {
        let url = url.trim();
        let (header, payload) = url
            .split_once(',')
            .ok_or(SignatureError::MalformedDataUrl)?;

        let header = header.to_ascii_lowercase();
        let subtype = header
            .strip_prefix("data:image/")
            .and_then(|rest| rest.strip_suffix(";base64"))
            .ok_or(SignatureError::MalformedDataUrl)?;
        let format =
            ImageFormat::from_mime_subtype(subtype).ok_or(SignatureError::MalformedDataUrl)?;

        if payload.is_empty() {
            return Err(SignatureError::Empty);
        }
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| SignatureError::InvalidBase64(e.to_string()))?;
        if bytes.is_empty() {
            return Err(SignatureError::Empty);
        }

        Ok(Self { format, bytes })
    }
}

/// Opaque reference to a persisted signature blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn test_parse_png() {
        let img = SignatureImage::from_data_url(&format!("data:image/png;base64,{}", PNG_B64))
            .unwrap();
        assert_eq!(img.format, ImageFormat::Png);
        assert_eq!(&img.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_parse_jpeg_case_insensitive() {
        let img = SignatureImage::from_data_url("DATA:IMAGE/JPEG;BASE64,/9j/4AAQ").unwrap();
        assert_eq!(img.format, ImageFormat::Jpeg);
        assert_eq!(img.format.extension(), "jpg");
    }

    #[test]
    fn test_rejects_other_types() {
        assert_eq!(
            SignatureImage::from_data_url("data:image/gif;base64,R0lGOD"),
            Err(SignatureError::MalformedDataUrl)
        );
        assert_eq!(
            SignatureImage::from_data_url("data:image/png,plain"),
            Err(SignatureError::MalformedDataUrl)
        );
        assert_eq!(
            SignatureImage::from_data_url("not a data url"),
            Err(SignatureError::MalformedDataUrl)
        );
    }

    #[test]
    fn test_rejects_bad_payload() {
        assert_eq!(
            SignatureImage::from_data_url("data:image/png;base64,"),
            Err(SignatureError::Empty)
        );
        assert!(matches!(
            SignatureImage::from_data_url("data:image/png;base64,@@@@"),
            Err(SignatureError::InvalidBase64(_))
        ));
    }
}
