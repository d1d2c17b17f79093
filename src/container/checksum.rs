//! CRC-32 (IEEE, reflected polynomial `0xEDB88320`) as used by PNG and zlib.

use crc32fast::Hasher;

/// Checksum of an arbitrary byte sequence.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Checksum of a PNG chunk: computed over the type tag followed by the data.
pub fn chunk_crc(kind: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    hasher.finalize()
}
