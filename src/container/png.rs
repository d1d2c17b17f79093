//! PNG text-chunk injection.
//!
//! PNG files consist of a signature followed by chunks. Each chunk has:
//! - 4 bytes: length (big-endian, data only)
//! - 4 bytes: chunk type (ASCII)
//! - N bytes: data
//! - 4 bytes: CRC32 over type + data
//!
//! Each metadata entry becomes one `tEXt` chunk (Latin-1 keyword, NUL,
//! Latin-1 text). Values that cannot be expressed in Latin-1 are written as
//! uncompressed `iTXt` chunks carrying UTF-8 instead. All new chunks are
//! placed directly after `IHDR`, in entry order.

use super::checksum::chunk_crc;
use super::{PNG_SIGNATURE, has_png_signature};
use crate::error::{InjectError, Result};
use crate::metadata::MetadataRecord;

const IHDR: [u8; 4] = *b"IHDR";
const TEXT: [u8; 4] = *b"tEXt";
const ITXT: [u8; 4] = *b"iTXt";

/// Chunk data length is a 31-bit quantity.
pub const MAX_CHUNK_LEN: usize = i32::MAX as usize;
/// Keywords are 1–79 bytes.
pub const MAX_KEYWORD_LEN: usize = 79;

/// A text chunk ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    kind: [u8; 4],
    data: Vec<u8>,
}

impl TextChunk {
    /// Build a `tEXt` chunk, or an `iTXt` chunk when `text` is not Latin-1.
    pub fn new(keyword: &str, text: &str) -> Result<Self> {
        let keyword = encode_keyword(keyword)?;
        let text: String = text.chars().filter(|&c| c != '\0').collect();

        let (kind, data) = match encode_latin1(&text) {
            Some(latin1) => {
                let mut data = Vec::with_capacity(keyword.len() + 1 + latin1.len());
                data.extend_from_slice(&keyword);
                data.push(0);
                data.extend_from_slice(&latin1);
                (TEXT, data)
            }
            None => {
                // keyword NUL, compression flag + method, empty language NUL,
                // empty translated keyword NUL, UTF-8 text.
                let mut data = Vec::with_capacity(keyword.len() + 5 + text.len());
                data.extend_from_slice(&keyword);
                data.extend_from_slice(&[0, 0, 0, 0, 0]);
                data.extend_from_slice(text.as_bytes());
                (ITXT, data)
            }
        };

        if data.len() > MAX_CHUNK_LEN {
            return Err(InjectError::SegmentOverflow {
                container: "PNG",
                len: data.len(),
                max: MAX_CHUNK_LEN,
            });
        }

        Ok(Self { kind, data })
    }

    pub fn kind(&self) -> &[u8; 4] {
        &self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Append length, type, data and CRC to `output`.
    pub fn write_to(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        output.extend_from_slice(&self.kind);
        output.extend_from_slice(&self.data);
        output.extend_from_slice(&chunk_crc(&self.kind, &self.data).to_be_bytes());
    }

    /// Serialized size including the 12 bytes of framing.
    pub fn encoded_len(&self) -> usize {
        self.data.len() + 12
    }
}

fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

fn encode_keyword(keyword: &str) -> Result<Vec<u8>> {
    let invalid = |reason| InjectError::InvalidKeyword {
        keyword: keyword.to_string(),
        reason,
    };

    if keyword.is_empty() {
        return Err(invalid("keyword is empty"));
    }
    let bytes = encode_latin1(keyword).ok_or_else(|| invalid("keyword is not Latin-1"))?;
    if bytes.len() > MAX_KEYWORD_LEN {
        return Err(invalid("keyword is longer than 79 bytes"));
    }
    // Printable Latin-1 only: 32-126 and 161-255.
    if bytes.iter().any(|&b| !(32..=126).contains(&b) && b < 161) {
        return Err(invalid("keyword contains non-printable characters"));
    }
    Ok(bytes)
}

/// Offset just past the `IHDR` chunk's CRC.
fn header_end(bytes: &[u8]) -> Result<usize> {
    let mut pos = PNG_SIGNATURE.len();

    loop {
        if pos + 8 > bytes.len() {
            return Err(InjectError::malformed("PNG", "IHDR chunk not found"));
        }
        let length =
            u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
                as usize;
        let kind = &bytes[pos + 4..pos + 8];

        let end = pos
            .checked_add(12)
            .and_then(|p| p.checked_add(length))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                InjectError::malformed(
                    "PNG",
                    format!("truncated {} chunk at offset {pos}", String::from_utf8_lossy(kind)),
                )
            })?;

        if kind == IHDR {
            return Ok(end);
        }
        pos = end;
    }
}

/// Return a copy of `bytes` with one text chunk per metadata entry inserted
/// right after `IHDR`.
///
/// A buffer without the PNG signature is returned unchanged. Once the
/// signature is present, a missing or truncated `IHDR` is a hard error.
pub fn inject_text_chunks(bytes: &[u8], metadata: &MetadataRecord) -> Result<Vec<u8>> {
    if !has_png_signature(bytes) {
        log::debug!("PNG signature missing, passing buffer through");
        return Ok(bytes.to_vec());
    }

    let insert_at = header_end(bytes)?;
    let chunks = metadata
        .iter()
        .map(|(key, value)| TextChunk::new(key, value))
        .collect::<Result<Vec<_>>>()?;

    let added: usize = chunks.iter().map(TextChunk::encoded_len).sum();
    log::debug!(
        "Inserting {} text chunk(s), {added} bytes, at offset {insert_at}",
        chunks.len()
    );

    let mut output = Vec::with_capacity(bytes.len() + added);
    output.extend_from_slice(&bytes[..insert_at]);
    for chunk in &chunks {
        chunk.write_to(&mut output);
    }
    output.extend_from_slice(&bytes[insert_at..]);
    Ok(output)
}
