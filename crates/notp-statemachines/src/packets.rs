use notp_packets::{
    combine_u32, deserialize_u16, deserialize_u64, has_u32, serialize_u16, serialize_u64,
    PacketResult, Packetable,
};

/// Packet type of [`StatePacket`].
pub const STATE_PACKET_TYPE: u32 = 10;

// Message values. Either half of a packed value may carry one of these.
pub const UNKNOWN_MESSAGE: u32 = 0;
pub const REJECTED_MESSAGE: u32 = 1;
pub const ACK_MESSAGE: u32 = 2;
pub const ACTIVE_DATA_STREAM_MESSAGE: u32 = 3;
pub const COMPLETED_DATA_STREAM_MESSAGE: u32 = 4;

// Message codes.
pub const FLOW_ID_VALUE: u16 = 10;
pub const START_FLOW: u16 = 100;
pub const ACTION_RESPONSE: u16 = 101;
pub const TERMINATE_MESSAGE: u16 = 102;
pub const NOTIFY_OBJECTS_STATE: u16 = 111;
pub const REQUEST_CURRENT_OBJECTS_STATE: u16 = 112;
pub const RESPOND_CURRENT_STATE: u16 = 113;
pub const NEGOTIATION_REQUEST: u16 = 141;
pub const RESPOND_NEGOTIATION_REQUEST: u16 = 142;
pub const EXCHANGE_DATA_STREAM: u16 = 170;
pub const COMMIT: u16 = 200;

/// Control packet leading every frame exchanged by the participants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatePacket {
    pub message_code: u16,
    pub message_value: u64,
    pub error_code: u16,
}

impl StatePacket {
    /// Create a packet; `message_value` usually packs two message values.
    pub fn new(message_code: u16, message_value: u64, error_code: u16) -> Self {
        Self {
            message_code,
            message_value,
            error_code,
        }
    }

    /// Packet telling the peer to end its run.
    pub fn terminate() -> Self {
        Self::new(TERMINATE_MESSAGE, 0, 0)
    }

    /// `true` when the error code is non-zero.
    pub fn has_error(&self) -> bool {
        self.error_code > 0
    }

    /// `true` when either half of the value is an ack.
    pub fn has_ack(&self) -> bool {
        has_u32(self.message_value, ACK_MESSAGE) && !self.has_error()
    }

    /// `true` while the sender has more data to stream.
    pub fn has_active_data_stream(&self) -> bool {
        has_u32(self.message_value, ACTIVE_DATA_STREAM_MESSAGE) && !self.has_error()
    }

    /// `true` when the sender finished streaming.
    pub fn has_completed_data_stream(&self) -> bool {
        has_u32(self.message_value, COMPLETED_DATA_STREAM_MESSAGE) && !self.has_error()
    }
}

impl Packetable for StatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32(STATE_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> PacketResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(15);
        serialize_u16(&mut buf, self.message_code);
        serialize_u64(&mut buf, self.message_value);
        serialize_u16(&mut buf, self.error_code);
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> PacketResult<Self> {
        let (message_code, rest) = deserialize_u16(data)?;
        let (message_value, rest) = deserialize_u64(rest)?;
        let (error_code, _) = deserialize_u16(rest)?;
        Ok(Self::new(message_code, message_value, error_code))
    }
}
