use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{PacketError, PacketResult};

/// Reserved delimiter terminating every serialized segment.
pub const PACKET_NULL_BYTE: u8 = 0xFF;

/// Encode a byte array so it can never contain [`PACKET_NULL_BYTE`].
pub fn encode_byte_array(data: &[u8]) -> Vec<u8> {
    STANDARD.encode(data).into_bytes()
}

/// Decode a byte array produced by [`encode_byte_array`].
pub fn decode_byte_array(data: &[u8]) -> PacketResult<Vec<u8>> {
    Ok(STANDARD.decode(data)?)
}

/// Split a variable-length segment at the next delimiter.
fn split_variable<'a>(data: &'a [u8], what: &'static str) -> PacketResult<(&'a [u8], &'a [u8])> {
    let index = data
        .iter()
        .position(|b| *b == PACKET_NULL_BYTE)
        .ok_or(PacketError::MissingDelimiter(what))?;
    Ok((&data[..index], &data[index + 1..]))
}

/// Split a fixed-width segment. The value bytes are taken by width so an
/// integer containing `0xFF` is never cut short; the byte right after them
/// must be the delimiter.
fn split_fixed<'a>(
    data: &'a [u8],
    width: usize,
    what: &'static str,
) -> PacketResult<(&'a [u8], &'a [u8])> {
    match data.get(width) {
        Some(&PACKET_NULL_BYTE) => Ok((&data[..width], &data[width + 1..])),
        _ => match data.iter().position(|b| *b == PACKET_NULL_BYTE) {
            Some(len) => Err(PacketError::InvalidSegment { what, len }),
            None => Err(PacketError::MissingDelimiter(what)),
        },
    }
}

/// Append `value` base64-encoded, followed by the delimiter.
pub fn serialize_string(buf: &mut Vec<u8>, value: &str) {
    serialize_bytes(buf, value.as_bytes());
}

/// Returns the decoded string and the remaining buffer.
pub fn deserialize_string(data: &[u8]) -> PacketResult<(String, &[u8])> {
    let (bytes, rest) = deserialize_bytes(data)?;
    let value = String::from_utf8(bytes)
        .map_err(|e| PacketError::Deserialization(format!("string is not valid utf-8: {e}")))?;
    Ok((value, rest))
}

/// Append `value` base64-encoded, followed by the delimiter.
pub fn serialize_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    buf.extend_from_slice(&encode_byte_array(value));
    buf.push(PACKET_NULL_BYTE);
}

/// Returns the decoded bytes and the remaining buffer.
pub fn deserialize_bytes(data: &[u8]) -> PacketResult<(Vec<u8>, &[u8])> {
    let (segment, rest) = split_variable(data, "bytes")?;
    Ok((decode_byte_array(segment)?, rest))
}

/// Append `value` as a single byte, followed by the delimiter.
pub fn serialize_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
    buf.push(PACKET_NULL_BYTE);
}

/// Read a bool written by [`serialize_bool`]; returns the value and the rest.
pub fn deserialize_bool(data: &[u8]) -> PacketResult<(bool, &[u8])> {
    let (segment, rest) = split_fixed(data, 1, "bool")?;
    Ok((segment[0] == 1, rest))
}

/// Append `value` big-endian, followed by the delimiter.
pub fn serialize_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
    buf.push(PACKET_NULL_BYTE);
}

/// Read a `u16` written by [`serialize_u16`]; returns the value and the rest.
pub fn deserialize_u16(data: &[u8]) -> PacketResult<(u16, &[u8])> {
    let (segment, rest) = split_fixed(data, 2, "u16")?;
    Ok((u16::from_be_bytes([segment[0], segment[1]]), rest))
}

/// Append `value` big-endian, followed by the delimiter.
pub fn serialize_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
    buf.push(PACKET_NULL_BYTE);
}

/// Read a `u32` written by [`serialize_u32`]; returns the value and the rest.
pub fn deserialize_u32(data: &[u8]) -> PacketResult<(u32, &[u8])> {
    let (segment, rest) = split_fixed(data, 4, "u32")?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(segment);
    Ok((u32::from_be_bytes(raw), rest))
}

/// Append `value` big-endian, followed by the delimiter.
pub fn serialize_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
    buf.push(PACKET_NULL_BYTE);
}

/// Read a `u64` written by [`serialize_u64`]; returns the value and the rest.
pub fn deserialize_u64(data: &[u8]) -> PacketResult<(u64, &[u8])> {
    let (segment, rest) = split_fixed(data, 8, "u64")?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(segment);
    Ok((u64::from_be_bytes(raw), rest))
}
