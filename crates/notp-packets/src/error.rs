use thiserror::Error;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("missing delimiter for {0}")]
    MissingDelimiter(&'static str),

    #[error("invalid {what} segment: {len} bytes")]
    InvalidSegment { what: &'static str, len: usize },

    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("missing protocol packet")]
    MissingProtocolPacket,

    #[error("protocol packet already written")]
    ProtocolAlreadyWritten,

    #[error("missing data packet")]
    MissingDataPacket,

    #[error("data packet stream already complete")]
    StreamComplete,

    #[error("truncated frame: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Convenience result type for packet operations.
pub type PacketResult<T> = Result<T, PacketError>;
