//! Payload packets carried behind a [`crate::StatePacket`] while peers
//! exchange refs and objects.

use notp_packets::{
    combine_u32, deserialize_bool, deserialize_bytes, deserialize_string, serialize_bool,
    serialize_bytes, serialize_string, PacketResult, Packetable,
};

pub const REMOTE_REF_PACKET_TYPE: u32 = 20;
pub const LOCAL_REF_PACKET_TYPE: u32 = 21;
pub const OBJECT_PACKET_TYPE: u32 = 22;
pub const OBJECT_HEADER_PACKET_TYPE: u32 = 23;

/// Ref advertised by the side that pushes or serves commits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteRefStatePacket {
    pub ref_prev_commit: String,
    pub ref_commit: String,
}

impl Packetable for RemoteRefStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32(REMOTE_REF_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        let mut buf = Vec::new();
        serialize_string(&mut buf, &self.ref_prev_commit);
        serialize_string(&mut buf, &self.ref_commit);
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        let (ref_prev_commit, rest) = deserialize_string(data)?;
        let (ref_commit, _) = deserialize_string(rest)?;
        Ok(Self {
            ref_prev_commit,
            ref_commit,
        })
    }
}

/// Local view of a ref returned to the remote side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalRefStatePacket {
    pub ref_commit: String,
    pub has_conflicts: bool,
    pub is_up_to_date: bool,
}

impl Packetable for LocalRefStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32(LOCAL_REF_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        let mut buf = Vec::new();
        serialize_string(&mut buf, &self.ref_commit);
        serialize_bool(&mut buf, self.has_conflicts);
        serialize_bool(&mut buf, self.is_up_to_date);
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        let (ref_commit, rest) = deserialize_string(data)?;
        let (has_conflicts, rest) = deserialize_bool(rest)?;
        let (is_up_to_date, _) = deserialize_bool(rest)?;
        Ok(Self {
            ref_commit,
            has_conflicts,
            is_up_to_date,
        })
    }
}

/// A full object streamed during the data exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectStatePacket {
    pub oid: String,
    pub otype: String,
    pub content: Vec<u8>,
}

impl Packetable for ObjectStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32(OBJECT_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.content.len() * 4 / 3 + 96);
        serialize_string(&mut buf, &self.oid);
        serialize_string(&mut buf, &self.otype);
        serialize_bytes(&mut buf, &self.content);
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        let (oid, rest) = deserialize_string(data)?;
        let (otype, rest) = deserialize_string(rest)?;
        let (content, _) = deserialize_bytes(rest)?;
        Ok(Self {
            oid,
            otype,
            content,
        })
    }
}

/// Announces an object without its content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHeaderStatePacket {
    pub oid: String,
    pub otype: String,
}

impl Packetable for ObjectHeaderStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32(OBJECT_HEADER_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        let mut buf = Vec::new();
        serialize_string(&mut buf, &self.oid);
        serialize_string(&mut buf, &self.otype);
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        let (oid, rest) = deserialize_string(data)?;
        let (otype, _) = deserialize_string(rest)?;
        Ok(Self { oid, otype })
    }
}
