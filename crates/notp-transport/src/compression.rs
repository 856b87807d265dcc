use crate::error::{TransportError, TransportResult};

/// Compress a whole frame.
pub fn compress(data: &[u8], level: i32) -> TransportResult<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| TransportError::Compression(e.to_string()))
}

/// Decompress a frame produced by [`compress`].
pub fn decompress(data: &[u8]) -> TransportResult<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| TransportError::Decompression(e.to_string()))
}
