//! Outbound collaborator boundaries: OSC control messages and flood-light
//! colors. Sends are fire-and-forget; transport failures stop here.

use crate::types::{ControlMessage, RgbPacket};
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, warn};

/// Destination for control values addressed by OSC path.
pub trait MessageSink {
    fn send(&mut self, address: &str, value: f64);
}

/// Destination for flood-light colors.
pub trait FloodLightSink {
    fn send_rgb(&mut self, packet: RgbPacket);
}

/// Forwards messages to the OSC sender thread without blocking.
pub struct ChannelSink {
    tx: Sender<ControlMessage>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<ControlMessage>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl MessageSink for ChannelSink {
    fn send(&mut self, address: &str, value: f64) {
        match self.tx.try_send(ControlMessage::new(address, value)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped % 1000 == 1 {
                    warn!("OSC queue full, {} messages dropped so far", self.dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                if self.dropped == 1 {
                    warn!("OSC sender gone, dropping control messages");
                }
            }
        }
    }
}

/// Logs every message instead of sending it (`--dry-run`).
#[derive(Debug, Default)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn send(&mut self, address: &str, value: f64) {
        info!("OSC {} {:.3}", address, value);
    }
}

/// Forwards colors to the serial link thread without blocking.
pub struct ChannelFloodSink {
    tx: Sender<RgbPacket>,
}

impl ChannelFloodSink {
    pub fn new(tx: Sender<RgbPacket>) -> Self {
        Self { tx }
    }
}

impl FloodLightSink for ChannelFloodSink {
    fn send_rgb(&mut self, packet: RgbPacket) {
        if self.tx.try_send(packet).is_err() {
            debug!("Flood light packet dropped");
        }
    }
}

/// Used when no microcontroller is attached.
#[derive(Debug, Default)]
pub struct NullFloodSink;

impl FloodLightSink for NullFloodSink {
    fn send_rgb(&mut self, packet: RgbPacket) {
        debug!(
            "Flood light {} → {:?} (no link)",
            packet.light_index, packet.rgb
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (tx, rx) = bounded(2);
        let mut sink = ChannelSink::new(tx);
        for i in 0..5 {
            sink.send("/a", i as f64);
        }
        assert_eq!(sink.dropped(), 3);
        assert_eq!(rx.try_recv().unwrap(), ControlMessage::new("/a", 0.0));
    }

    #[test]
    fn test_channel_sink_survives_disconnect() {
        let (tx, rx) = bounded(2);
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        sink.send("/a", 1.0);
        sink.send("/a", 1.0);
        assert_eq!(sink.dropped(), 2);
    }
}
