//! Gzip helpers for the pixel-history blob

use crate::error::StorageError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Gzip-compress bytes at the default level.
///
/// # Errors
///
/// Returns [`StorageError::Decode`] if the encoder fails (out of memory is
/// the only realistic cause).
pub fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|()| encoder.finish())
        .map_err(|e| StorageError::Decode(format!("gzip encode: {e}")))
}

/// Decompress a gzip payload.
///
/// # Errors
///
/// Returns [`StorageError::Decode`] on truncated or corrupt input.
pub fn gunzip_bytes(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StorageError::Decode(format!("gzip decode: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"frame history payload".repeat(100);
        let compressed = gzip_bytes(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(gunzip_bytes(&compressed).unwrap(), data);
    }

    #[test]
    fn corrupt_input_rejected() {
        assert!(gunzip_bytes(b"definitely not gzip").is_err());
    }
}
