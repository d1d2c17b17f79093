//! Container classification and format-level splicing.
//!
//! - [`sniff`]: decide whether a buffer is handled as JPEG, PNG or passed through
//! - [`jpeg::inject_comment`]: add a COM segment before the end-of-image marker
//! - [`png::inject_text_chunks`]: add text chunks right after `IHDR`
//! - [`checksum::chunk_crc`]: CRC-32 for PNG chunk trailers

pub mod checksum;
pub mod jpeg;
pub mod png;

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// The 8-byte signature every PNG stream starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// The output format the external codec was asked to produce.
///
/// # Example
///
/// ```rust
/// use image_stamp::container::OutputFormat;
///
/// assert_eq!(OutputFormat::parse("JPG"), OutputFormat::Jpeg);
/// assert_eq!(OutputFormat::parse("png").content_type(), "image/png");
/// assert_eq!(OutputFormat::parse("webp"), OutputFormat::WebP);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Other(String),
}

impl OutputFormat {
    /// Parse a declared format name. Case-insensitive; `jpg` is `jpeg`.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "jpeg" | "jpg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::WebP,
            _ => Self::Other(name),
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Some(Self::parse(ext))
    }

    /// Canonical lower-case name, also used as the file extension.
    pub fn name(&self) -> &str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Other(name) => name,
        }
    }

    /// The `image/<format>` content type for a response.
    pub fn content_type(&self) -> String {
        format!("image/{}", self.name())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a buffer will be handled by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Jpeg,
    Png,
    Unsupported,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Classify a re-encoded buffer.
///
/// The declared format is authoritative for dispatch. PNG is only accepted
/// when the buffer actually carries the PNG signature; anything else degrades
/// to [`ContainerKind::Unsupported`] so the caller passes the bytes through.
pub fn sniff(bytes: &[u8], format: &OutputFormat) -> ContainerKind {
    match format {
        OutputFormat::Jpeg => ContainerKind::Jpeg,
        OutputFormat::Png if has_png_signature(bytes) => ContainerKind::Png,
        OutputFormat::Png => {
            log::debug!("Declared PNG but signature check failed");
            ContainerKind::Unsupported
        }
        OutputFormat::WebP | OutputFormat::Other(_) => ContainerKind::Unsupported,
    }
}

pub(crate) fn has_png_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Whether `bytes` open with the signature of `format`.
///
/// Only JPEG and PNG are checked; other formats are never injected into and
/// always match.
pub fn matches_signature(bytes: &[u8], format: &OutputFormat) -> bool {
    match format {
        OutputFormat::Jpeg => bytes.starts_with(&JPEG_SOI),
        OutputFormat::Png => has_png_signature(bytes),
        OutputFormat::WebP | OutputFormat::Other(_) => true,
    }
}
