use crate::codec::{deserialize_u32, serialize_u32};
use crate::error::PacketResult;
use crate::packet::{combine_u32, Packetable, PROTOCOL_PACKET_TYPE};

/// The only protocol version understood by this implementation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Envelope written at the head of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolPacket {
    pub version: u32,
}

impl ProtocolPacket {
    /// Envelope for protocol `version`.
    pub fn new(version: u32) -> Self {
        Self { version }
    }
}

impl Default for ProtocolPacket {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION)
    }
}

impl Packetable for ProtocolPacket {
    fn packet_type(&self) -> u64 {
        combine_u32(PROTOCOL_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(5);
        serialize_u32(&mut buf, self.version);
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        let (version, _) = deserialize_u32(data)?;
        Ok(Self { version })
    }
}
