//! Binary codec and stream framing for the NOTP protocol.
//!
//! Every value on the wire is a segment terminated by the reserved
//! [`PACKET_NULL_BYTE`]. Variable-length values (strings, byte blobs) are
//! base64-encoded first so the delimiter can never appear inside them;
//! fixed-width integers are big-endian and must have their exact width.
//!
//! A physical frame is built by [`PacketWriter`]: a [`ProtocolPacket`]
//! envelope followed by one or more data packets, the first of which carries
//! the total stream count. [`PacketReader`] walks the same frame back.

pub mod codec;
pub mod error;
pub mod packet;
pub mod protocol;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_byte_array, deserialize_bool, deserialize_bytes, deserialize_string,
    deserialize_u16, deserialize_u32, deserialize_u64, encode_byte_array, serialize_bool,
    serialize_bytes, serialize_string, serialize_u16, serialize_u32, serialize_u64,
    PACKET_NULL_BYTE,
};
pub use error::{PacketError, PacketResult};
pub use packet::{
    combine_u32, convert_packetable, has_u32, split_u64, Packet, Packetable, PACKET_TYPE,
    PROTOCOL_PACKET_TYPE,
};
pub use protocol::{ProtocolPacket, PROTOCOL_VERSION};
pub use reader::{DataPacketState, PacketReader};
pub use writer::PacketWriter;
