use std::fmt;

use crate::error::PacketResult;

/// Type of the generic, opaque [`Packet`].
pub const PACKET_TYPE: u32 = 0;
/// Type of the protocol envelope packet.
pub const PROTOCOL_PACKET_TYPE: u32 = 1;

/// Pack two `u32` values into one `u64` (`high << 32 | low`).
pub const fn combine_u32(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

/// Split a `u64` into its `(high, low)` halves.
pub const fn split_u64(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, (value & 0xFFFF_FFFF) as u32)
}

/// Returns `true` if either half of `value` equals `target`.
pub fn has_u32(value: u64, target: u32) -> bool {
    let (high, low) = split_u64(value);
    high == target || low == target
}

/// A value that can be carried as a data packet inside a NOTP frame.
pub trait Packetable: Send + Sync + fmt::Debug {
    /// Packed packet type, usually `combine_u32(TYPE, 0)`.
    fn packet_type(&self) -> u64;

    fn serialize(&self) -> PacketResult<Vec<u8>>;

    fn deserialize(data: &[u8]) -> PacketResult<Self>
    where
        Self: Sized;
}

/// Raw framed bytes. Every payload handed back by the transport is a `Packet`
/// and is turned into a typed packet with [`convert_packetable`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
}

impl Packet {
    /// Wrap raw frame bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Capture any packetable as raw bytes.
    pub fn from_packetable(packet: &dyn Packetable) -> PacketResult<Self> {
        Ok(Self {
            data: packet.serialize()?,
        })
    }

    /// Length of the raw bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet").field("len", &self.data.len()).finish()
    }
}

impl Packetable for Packet {
    fn packet_type(&self) -> u64 {
        combine_u32(PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        Ok(Self::new(data))
    }
}

/// Convert one packetable into another by serializing and deserializing.
pub fn convert_packetable<T: Packetable>(packet: &dyn Packetable) -> PacketResult<T> {
    let data = packet.serialize()?;
    T::deserialize(&data)
}
