use std::fmt;
use std::sync::Arc;

use notp_packets::Packet;

use crate::error::{TransportError, TransportResult};

/// Callback observing a frame.
pub type PacketHandler = Arc<dyn Fn(&Packet) + Send + Sync>;

/// Diagnostic hook called with every uncompressed frame the transport sends
/// or receives. It never influences the protocol.
#[derive(Clone)]
pub struct PacketInspector {
    on_sent: Option<PacketHandler>,
    on_received: Option<PacketHandler>,
}

impl PacketInspector {
    /// Inspector calling `on_sent` and `on_received` for every frame. At least
    /// one of them must be set.
    pub fn new(
        on_sent: Option<PacketHandler>,
        on_received: Option<PacketHandler>,
    ) -> TransportResult<Self> {
        if on_sent.is_none() && on_received.is_none() {
            return Err(TransportError::InvalidInspector);
        }
        Ok(Self {
            on_sent,
            on_received,
        })
    }

    /// Report a frame before it is compressed and sent.
    pub fn inspect_sent(&self, packet: &Packet) {
        if let Some(handler) = &self.on_sent {
            handler(packet);
        }
    }

    /// Report a frame after it is received and decompressed.
    pub fn inspect_received(&self, packet: &Packet) {
        if let Some(handler) = &self.on_received {
            handler(packet);
        }
    }
}

impl fmt::Debug for PacketInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketInspector")
            .field("on_sent", &self.on_sent.is_some())
            .field("on_received", &self.on_received.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn requires_a_handler() {
        let err = PacketInspector::new(None, None).unwrap_err();
        assert!(matches!(err, TransportError::InvalidInspector));
    }

    #[test]
    fn calls_only_configured_handler() {
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let inspector = PacketInspector::new(
            Some(Arc::new(move |_: &Packet| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            None,
        )
        .unwrap();
        inspector.inspect_sent(&Packet::new(b"a".to_vec()));
        inspector.inspect_received(&Packet::new(b"b".to_vec()));
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }
}
