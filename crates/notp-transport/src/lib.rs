//! Transport layer for the NOTP protocol.
//!
//! [`TransportLayer`] turns a list of packetables into one compressed frame
//! (protocol envelope + data packets) and hands it to a [`PacketSender`];
//! on the way back it pulls a frame from a [`PacketReceiver`], decompresses
//! it, checks the protocol version and returns the payload packets in order.
//!
//! Two stream backends implement the sender/receiver pair:
//!
//! - [`InMemoryStream`] -- bounded channel with a fixed timeout, for loopback use
//! - [`WireStream`] -- wraps blocking user I/O functions and enforces the timeout
//!   regardless of how the underlying I/O blocks

pub mod compression;
pub mod config;
pub mod error;
pub mod inspector;
pub mod layer;
pub mod memory;
pub mod traits;
pub mod wire;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use inspector::{PacketHandler, PacketInspector};
pub use layer::TransportLayer;
pub use memory::InMemoryStream;
pub use traits::{PacketReceiver, PacketSender};
pub use wire::{WireRecvFn, WireSendFn, WireStream};
