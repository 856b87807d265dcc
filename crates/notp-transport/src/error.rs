use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot send an empty packet list")]
    EmptyTransmission,

    #[error("received a nil packet")]
    NilPacket,

    #[error("unsupported protocol version: local {local}, remote {remote}")]
    UnsupportedVersion { local: u32, remote: u32 },

    #[error("timeout {0}")]
    Timeout(&'static str),

    #[error("end of stream")]
    EndOfStream,

    #[error("channel error: {0}")]
    Channel(String),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("packet inspector needs at least one handler")]
    InvalidInspector,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("packet error: {0}")]
    Packet(#[from] notp_packets::PacketError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
