//! JPEG comment-segment injection.
//!
//! The resolved metadata is flattened into `key:value` lines and written as a
//! single COM (`FF FE`) segment placed directly before the end-of-image
//! marker. Every other byte of the stream is copied unchanged.

use crate::error::{InjectError, Result};
use crate::metadata::MetadataRecord;

const MARKER_PREFIX: u8 = 0xFF;
const COM: u8 = 0xFE;
const EOI: u8 = 0xD9;

/// Largest comment payload: the 16-bit length field also counts its own two bytes.
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize - 2;

/// Build a complete COM segment (marker, length, payload) for `text`.
pub fn build_comment_segment(text: &str) -> Result<Vec<u8>> {
    let payload = text.as_bytes();
    if payload.len() > MAX_COMMENT_LEN {
        return Err(InjectError::SegmentOverflow {
            container: "JPEG",
            len: payload.len(),
            max: MAX_COMMENT_LEN,
        });
    }

    let length = (payload.len() + 2) as u16;
    let mut segment = Vec::with_capacity(payload.len() + 4);
    segment.extend_from_slice(&[MARKER_PREFIX, COM]);
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(payload);
    Ok(segment)
}

/// Offset of the last `FF D9` pair, if any.
fn find_eoi(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(2)
        .rposition(|w| w == [MARKER_PREFIX, EOI])
}

/// Return a copy of `bytes` with `metadata` spliced in as a COM segment.
///
/// The segment goes immediately before the last end-of-image marker, or at
/// the end of the buffer when no marker is present.
pub fn inject_comment(bytes: &[u8], metadata: &MetadataRecord) -> Result<Vec<u8>> {
    let segment = build_comment_segment(&metadata.flatten_lines())?;
    let insert_at = find_eoi(bytes).unwrap_or_else(|| {
        log::debug!("No EOI marker found, appending COM segment");
        bytes.len()
    });
    log::debug!(
        "Inserting {}-byte COM segment at offset {insert_at}",
        segment.len()
    );

    let mut output = Vec::with_capacity(bytes.len() + segment.len());
    output.extend_from_slice(&bytes[..insert_at]);
    output.extend_from_slice(&segment);
    output.extend_from_slice(&bytes[insert_at..]);
    Ok(output)
}
