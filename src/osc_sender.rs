use crate::types::ControlMessage;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::UdpSocket;

/// Drains control messages from the tick loop and sends each one to the
/// media server as a single-float OSC message.
pub struct OscSender {
    rx: Receiver<ControlMessage>,
    target: String,
}

impl OscSender {
    pub fn new(rx: Receiver<ControlMessage>, target: String) -> Self {
        Self { rx, target }
    }

    /// Run the OSC sender loop. Blocks the calling thread until every
    /// sender side of the channel is dropped.
    pub fn run(&self) {
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to bind UDP socket: {}", e);
                return;
            }
        };
        info!("OSC sender → {}", self.target);

        let mut errors: u64 = 0;
        for msg in self.rx.iter() {
            if let Err(e) = self.send(&socket, &msg) {
                errors += 1;
                debug!("OSC send error on {}: {}", msg.address, e);
            }
        }
        info!("OSC sender shutting down ({} send errors)", errors);
    }

    fn send(
        &self,
        socket: &UdpSocket,
        msg: &ControlMessage,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let buf = encode_message(msg)?;
        socket.send_to(&buf, &self.target)?;
        Ok(())
    }
}

pub fn encode_message(msg: &ControlMessage) -> Result<Vec<u8>, rosc::OscError> {
    let packet = OscPacket::Message(OscMessage {
        addr: msg.address.clone(),
        args: vec![OscType::Float(msg.value as f32)],
    });
    rosc::encoder::encode(&packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_encode_single_float() {
        let buf = encode_message(&ControlMessage::new("/Lights/Speed", 0.25)).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf).unwrap();
        match packet {
            OscPacket::Message(m) => {
                assert_eq!(m.addr, "/Lights/Speed");
                assert_eq!(m.args, vec![OscType::Float(0.25)]);
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_sends_to_target_and_stops_when_channel_closes() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || OscSender::new(rx, target).run());
        tx.send(ControlMessage::new("/bg/Opacity", 1.0)).unwrap();
        drop(tx);
        handle.join().unwrap();

        let mut buf = [0u8; rosc::decoder::MTU];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        let OscPacket::Message(m) = packet else {
            panic!("expected message");
        };
        assert_eq!(m.addr, "/bg/Opacity");
        assert_eq!(m.args, vec![OscType::Float(1.0)]);
    }
}
