//! Product image encoding.
//!
//! The uploaded photo is encoded exactly once and the resulting
//! [`EncodedImage`] is shared read-only by the concept call and every
//! image attempt.

use crate::error::{AdCraftError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Image formats accepted as uploads and returned by the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parses a MIME type such as `image/jpeg`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// A product image ready to be sent to the generative API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard base64 of the raw file bytes, without any `data:` prefix.
    pub data: String,
    /// Declared MIME type of the upload.
    pub mime_type: String,
}

impl EncodedImage {
    /// Encodes raw upload bytes with their declared MIME type.
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AdCraftError::Input("image file is empty".into()));
        }
        let format = ImageFormat::from_mime_type(mime_type).ok_or_else(|| {
            AdCraftError::Input(format!("unsupported image type '{mime_type}'"))
        })?;

        Ok(Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: format.mime_type().to_string(),
        })
    }

    /// Reads and encodes an image file.
    ///
    /// The MIME type comes from the file extension, falling back to the
    /// file's magic bytes when the extension is missing or unknown.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AdCraftError::Input(format!("cannot read {}: {}", path.display(), e))
        })?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .or_else(|| ImageFormat::from_magic_bytes(&bytes))
            .ok_or_else(|| {
                AdCraftError::Input(format!(
                    "{} is not a PNG, JPEG or WebP image",
                    path.display()
                ))
            })?;

        Self::from_bytes(&bytes, format.mime_type())
    }

    /// Returns the image as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_mime_type("IMAGE/PNG"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime_type("image/gif"), None);
    }

    #[test]
    fn test_from_bytes_has_no_data_url_prefix() {
        let encoded = EncodedImage::from_bytes(b"hello", "image/png").unwrap();
        assert_eq!(encoded.data, "aGVsbG8=");
        assert_eq!(encoded.mime_type, "image/png");
        assert_eq!(encoded.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_from_bytes_rejects_empty_and_unknown() {
        assert!(matches!(
            EncodedImage::from_bytes(&[], "image/png"),
            Err(AdCraftError::Input(_))
        ));
        assert!(matches!(
            EncodedImage::from_bytes(b"data", "text/plain"),
            Err(AdCraftError::Input(_))
        ));
    }

    #[tokio::test]
    async fn test_from_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.jpg");
        std::fs::write(&path, JPEG_MAGIC).unwrap();

        let encoded = EncodedImage::from_path(&path).await.unwrap();
        assert_eq!(encoded.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_from_path_sniffs_magic_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&PNG_MAGIC).unwrap();

        let encoded = EncodedImage::from_path(file.path()).await.unwrap();
        assert_eq!(encoded.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_from_path_missing_file_is_input_error() {
        let err = EncodedImage::from_path("/definitely/not/here.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AdCraftError::Input(_)));
    }
}
