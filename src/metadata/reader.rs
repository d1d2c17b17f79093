use img_parts::Bytes;
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use nom_exif::*;
use std::path::Path;

use super::MetadataRecord;
use crate::container::{JPEG_SOI, has_png_signature};
use crate::error::{InjectError, Result};

const JPEG_COM: u8 = 0xFE;
const FALLBACK_COMMENT_KEY: &str = "Comment";

fn unreadable(reason: impl Into<String>) -> InjectError {
    InjectError::UnreadableOriginalMetadata {
        reason: reason.into(),
    }
}

/// Read the metadata already present in a source image file.
///
/// Collects EXIF entries (tag name → display string), then PNG text chunks
/// or JPEG comment lines. Text entries overwrite EXIF entries on key
/// conflict. Within a PNG the first text chunk for a keyword wins, since new
/// chunks are spliced in directly after `IHDR`; within a JPEG the last COM
/// line wins, since new segments go just before the end-of-image marker.
/// A file with no metadata gives an empty record; only I/O or container
/// parse failures are errors.
pub fn read_original(path: &Path) -> Result<MetadataRecord> {
    let bytes = std::fs::read(path)
        .map_err(|e| unreadable(format!("failed to read {}: {e}", path.display())))?;

    let mut record = MetadataRecord::new();
    read_exif_entries(path, &mut record);
    read_text_entries(bytes, &mut record)?;

    log::debug!(
        "Read {} original metadata entries from {}",
        record.len(),
        path.display()
    );
    Ok(record)
}

/// Like [`read_original`] for an in-memory buffer, without EXIF.
pub fn read_original_bytes(bytes: &[u8]) -> Result<MetadataRecord> {
    let mut record = MetadataRecord::new();
    read_text_entries(bytes.to_vec(), &mut record)?;
    Ok(record)
}

fn read_exif_entries(path: &Path, record: &mut MetadataRecord) {
    let mut parser = MediaParser::new();
    let ms = match MediaSource::file_path(path) {
        Ok(ms) => ms,
        Err(e) => {
            log::debug!("Cannot open {} for EXIF: {e}", path.display());
            return;
        }
    };

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return;
        }
    };

    for entry in iter {
        let Some(value) = entry.get_value().and_then(entry_to_string) else {
            continue;
        };
        let key = entry
            .tag()
            .map(|tag| tag.to_string())
            .unwrap_or_else(|| format!("Tag0x{:04X}", entry.tag_code()));
        record.insert(key, value);
    }
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn read_text_entries(bytes: Vec<u8>, record: &mut MetadataRecord) -> Result<()> {
    if has_png_signature(&bytes) {
        let png = Png::from_bytes(Bytes::from(bytes))
            .map_err(|e| unreadable(format!("failed to parse PNG: {e}")))?;
        let mut text = MetadataRecord::new();
        for chunk in png.chunks() {
            let parsed = match &chunk.kind() {
                b"tEXt" => parse_text_chunk(chunk.contents()),
                b"iTXt" => parse_itxt_chunk(chunk.contents()),
                _ => None,
            };
            match parsed {
                Some((key, _)) if text.contains_key(&key) => {
                    log::debug!("Ignoring older text chunk for {key:?}");
                }
                Some((key, value)) => {
                    text.insert(key, value);
                }
                None => {}
            }
        }
        for (key, value) in text.iter() {
            record.insert(key, value);
        }
    } else if bytes.starts_with(&JPEG_SOI) {
        let jpeg = Jpeg::from_bytes(Bytes::from(bytes))
            .map_err(|e| unreadable(format!("failed to parse JPEG: {e}")))?;
        for segment in jpeg.segments().iter().filter(|s| s.marker() == JPEG_COM) {
            let text = String::from_utf8_lossy(segment.contents());
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                match line.split_once(':') {
                    Some((key, value)) if !key.is_empty() => record.insert(key, value),
                    _ => record.insert(FALLBACK_COMMENT_KEY, line),
                };
            }
        }
    }
    Ok(())
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// `keyword NUL text`, both Latin-1.
fn parse_text_chunk(data: &[u8]) -> Option<(String, String)> {
    let nul = data.iter().position(|&b| b == 0)?;
    Some((decode_latin1(&data[..nul]), decode_latin1(&data[nul + 1..])))
}

/// Uncompressed `iTXt` only: `keyword NUL flag method lang NUL translated NUL text`.
fn parse_itxt_chunk(data: &[u8]) -> Option<(String, String)> {
    let nul = data.iter().position(|&b| b == 0)?;
    let keyword = decode_latin1(&data[..nul]);
    let rest = data.get(nul + 1..)?;
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        log::debug!("Skipping compressed iTXt chunk {keyword:?}");
        return None;
    }
    let rest = rest.get(1..)?;
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = std::str::from_utf8(&rest[translated_end + 1..]).ok()?;
    Some((keyword, text.to_string()))
}
