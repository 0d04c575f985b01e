//! Images attached to a command.
//!
//! Images arrive base64-encoded in the request body. They are validated
//! against [`ImageConfig`], written to temporary files and referenced by
//! path in the prompt. The files are removed when [`StagedImages`] drops.

use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ghostrun_core::config::ImageConfig;
use serde::Deserialize;
use tempfile::TempPath;
use tracing::debug;

/// One image as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageAttachment {
    #[serde(default)]
    pub name: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Why attached images were rejected. Indexes are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("At most {max} images can be attached")]
    TooMany { max: usize },

    #[error("Image {index}: unsupported format {mime_type}")]
    UnsupportedType { index: usize, mime_type: String },

    #[error("Image {index}: invalid base64 data")]
    InvalidBase64 { index: usize },

    #[error("Image {index}: larger than {max_bytes} bytes")]
    TooLarge { index: usize, max_bytes: usize },

    #[error("Failed to save image {index}: {reason}")]
    Staging { index: usize, reason: String },
}

/// A validated, decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Check count, type, encoding and size of `images`, decoding them.
pub fn validate_images(
    images: &[ImageAttachment],
    limits: &ImageConfig,
) -> Result<Vec<DecodedImage>, ImageError> {
    if images.len() > limits.max_count {
        return Err(ImageError::TooMany {
            max: limits.max_count,
        });
    }
    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let index = i + 1;
            if !limits.allowed_mime_types.contains(&image.mime_type) {
                return Err(ImageError::UnsupportedType {
                    index,
                    mime_type: image.mime_type.clone(),
                });
            }
            let bytes = STANDARD
                .decode(&image.data)
                .map_err(|_| ImageError::InvalidBase64 { index })?;
            if bytes.len() > limits.max_bytes {
                return Err(ImageError::TooLarge {
                    index,
                    max_bytes: limits.max_bytes,
                });
            }
            Ok(DecodedImage {
                mime_type: image.mime_type.clone(),
                bytes,
            })
        })
        .collect()
}

/// File extension for a supported MIME type, empty if unknown.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => "",
    }
}

/// Images written to temporary files for the lifetime of one execution.
#[derive(Debug, Default)]
pub struct StagedImages {
    files: Vec<TempPath>,
}

impl StagedImages {
    /// Write each image to its own temporary file. Files already written
    /// are removed if a later one fails.
    pub fn stage(images: &[DecodedImage]) -> Result<Self, ImageError> {
        let mut staged = Self::default();
        for (i, image) in images.iter().enumerate() {
            let index = i + 1;
            let staging = |e: std::io::Error| ImageError::Staging {
                index,
                reason: e.to_string(),
            };
            let mut file = tempfile::Builder::new()
                .prefix(&format!("claude-image-{i}-"))
                .suffix(extension_for(&image.mime_type))
                .tempfile()
                .map_err(staging)?;
            file.write_all(&image.bytes).map_err(staging)?;
            file.flush().map_err(staging)?;
            let path = file.into_temp_path();
            debug!(path = %path.display(), size = image.bytes.len(), "Saved temp image");
            staged.files.push(path);
        }
        Ok(staged)
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(AsRef::as_ref).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
