use crate::codec::{decode_byte_array, PACKET_NULL_BYTE};
use crate::error::{PacketError, PacketResult};
use crate::packet::{Packet, Packetable};
use crate::protocol::ProtocolPacket;
use crate::writer::ID_SIZE;

/// Read `N` big-endian header fields and the delimiter that closes them.
/// Returns the fields and the offset of the payload.
fn read_header<const N: usize>(data: &[u8], offset: usize) -> PacketResult<([u64; N], usize)> {
    let end = offset + N * ID_SIZE;
    if data.len() <= end {
        return Err(PacketError::Truncated {
            offset,
            needed: N * ID_SIZE + 1,
            available: data.len().saturating_sub(offset),
        });
    }
    if data[end] != PACKET_NULL_BYTE {
        return Err(PacketError::MissingDelimiter("packet header"));
    }
    let mut values = [0u64; N];
    for (i, value) in values.iter_mut().enumerate() {
        let start = offset + i * ID_SIZE;
        let mut raw = [0u8; ID_SIZE];
        raw.copy_from_slice(&data[start..start + ID_SIZE]);
        *value = u64::from_be_bytes(raw);
    }
    Ok((values, end + 1))
}

fn read_payload(data: &[u8], offset: usize, size: u64) -> PacketResult<&[u8]> {
    let available = data.len().saturating_sub(offset);
    match usize::try_from(size) {
        Ok(size) if size <= available => Ok(&data[offset..offset + size]),
        _ => Err(PacketError::Truncated {
            offset,
            needed: usize::try_from(size).unwrap_or(usize::MAX),
            available,
        }),
    }
}

/// Cursor over the data packets of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataPacketState {
    offset: usize,
    size: usize,
    packet_type: u64,
    stream_size: u64,
    stream_index: u64,
}

impl DataPacketState {
    /// Type of the packet just read.
    pub fn packet_type(&self) -> u64 {
        self.packet_type
    }

    /// Number of data packets in the frame.
    pub fn stream_size(&self) -> u64 {
        self.stream_size
    }

    /// Zero-based index of the packet just read.
    pub fn stream_index(&self) -> u64 {
        self.stream_index
    }

    /// `true` once the last packet of the stream has been read.
    pub fn is_complete(&self) -> bool {
        self.stream_index + 1 == self.stream_size
    }
}

/// Reads a frame produced by [`crate::PacketWriter`].
///
/// A frame may mix packet types: every data packet carries its own type,
/// reported through [`DataPacketState::packet_type`]. Callers match the type
/// against what they expect to decode. The reader checks stream index and
/// count consistency.
pub struct PacketReader<'a> {
    data: &'a [u8],
}

impl<'a> PacketReader<'a> {
    /// Reader over the bytes of `packet`.
    pub fn new(packet: &'a Packet) -> Self {
        Self { data: &packet.data }
    }

    /// Reader over raw frame bytes.
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode the protocol envelope at the start of the frame.
    pub fn read_protocol(&self) -> PacketResult<ProtocolPacket> {
        if self.data.is_empty() {
            return Err(PacketError::MissingProtocolPacket);
        }
        let ([_, size], offset) = read_header::<2>(self.data, 0)?;
        let payload = read_payload(self.data, offset, size)?;
        ProtocolPacket::deserialize(payload)
    }

    /// Read the data packet after `state`, or the first one when `state` is
    /// `None`. Returns the decoded payload and the advanced cursor.
    pub fn read_next_data_packet(
        &self,
        state: Option<&DataPacketState>,
    ) -> PacketResult<(Vec<u8>, DataPacketState)> {
        if state.is_some_and(|s| s.is_complete()) {
            return Err(PacketError::StreamComplete);
        }
        if self.data.is_empty() {
            return Err(PacketError::MissingProtocolPacket);
        }
        let next = match state {
            None => {
                let ([_, protocol_size], offset) = read_header::<2>(self.data, 0)?;
                let protocol = read_payload(self.data, offset, protocol_size)?;
                let start = offset + protocol.len();
                if start >= self.data.len() {
                    return Err(PacketError::MissingDataPacket);
                }
                let ([stream_size, packet_type, size], offset) =
                    read_header::<3>(self.data, start)?;
                if stream_size == 0 {
                    return Err(PacketError::MissingDataPacket);
                }
                DataPacketState {
                    offset,
                    size: read_payload(self.data, offset, size)?.len(),
                    packet_type,
                    stream_size,
                    stream_index: 0,
                }
            }
            Some(prev) => {
                let start = prev.offset + prev.size;
                let ([packet_type, size], offset) = read_header::<2>(self.data, start)?;
                DataPacketState {
                    offset,
                    size: read_payload(self.data, offset, size)?.len(),
                    packet_type,
                    stream_size: prev.stream_size,
                    stream_index: prev.stream_index + 1,
                }
            }
        };
        let payload = &self.data[next.offset..next.offset + next.size];
        Ok((decode_byte_array(payload)?, next))
    }
}
