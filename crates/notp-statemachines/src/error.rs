use notp_packets::PacketError;
use notp_transport::TransportError;
use thiserror::Error;

/// Errors that abort a state-machine run.
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("state table is empty")]
    EmptyStateTable,

    #[error("state {0} does not exist in the state table")]
    MissingInitialState(u16),

    #[error("no transition for state {0}")]
    UnknownState(u16),

    #[error("unexpected message code: expected {expected}, received {actual}")]
    UnexpectedMessage { expected: u16, actual: u16 },

    #[error("peer reported error code {code}")]
    RemoteError { code: u16 },

    #[error("missing acknowledgment in {0}")]
    MissingAck(&'static str),

    #[error("unknown flow type {0}")]
    UnknownFlowType(u64),

    #[error("host handler failed: {0}")]
    Handler(String),

    #[error("missing {0} packet")]
    MissingPacket(&'static str),

    #[error("expected a single packet, received {0}")]
    TooManyPackets(usize),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Convenience result type for state-machine operations.
pub type StateMachineResult<T> = Result<T, StateMachineError>;
