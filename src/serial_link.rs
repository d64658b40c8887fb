use crate::control::{encode_rgb_packet, PacketDecoder};
use crate::types::{ControlInput, RgbPacket};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use std::io::{self, Read, Write};
use std::time::Duration;

const BAUD_RATE: u32 = 115_200;
/// Short read timeout so queued flood-light colors go out promptly.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Two-way link to the control desk microcontroller: control packets in,
/// flood-light colors out.
pub struct SerialLink {
    port_name: String,
    input_tx: Sender<ControlInput>,
    rgb_rx: Receiver<RgbPacket>,
}

impl SerialLink {
    pub fn new(
        port_name: String,
        input_tx: Sender<ControlInput>,
        rgb_rx: Receiver<RgbPacket>,
    ) -> Self {
        Self {
            port_name,
            input_tx,
            rgb_rx,
        }
    }

    /// Run the serial loop. Blocks the calling thread. If the port cannot be
    /// opened the installation keeps running without the control desk.
    pub fn run(&self) {
        info!("Opening serial port: {} @ {}", self.port_name, BAUD_RATE);

        let port = serialport::new(&self.port_name, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open();

        let mut port = match port {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to open serial port {}: {}", self.port_name, e);
                error!("Is the control desk connected? Run with --simulate-knobs for dev mode.");
                return;
            }
        };

        info!("Serial port opened");
        let mut buf = [0u8; 256];
        let mut decoder = PacketDecoder::new();
        let mut input_count: u64 = 0;

        loop {
            for packet in self.rgb_rx.try_iter() {
                if let Err(e) = port.write_all(&encode_rgb_packet(&packet)) {
                    debug!("Flood light write error: {}", e);
                }
            }

            match port.read(&mut buf) {
                Ok(n) => {
                    for input in decoder.feed(&buf[..n]) {
                        debug!("Control desk {}", input);
                        if self.input_tx.send(input).is_err() {
                            info!("Input receiver gone, closing serial link");
                            return;
                        }
                        input_count += 1;
                        if input_count.is_multiple_of(1000) {
                            info!(
                                "Serial: {} inputs, {} errors",
                                input_count,
                                decoder.errors()
                            );
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    warn!("Serial read error: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }
}

/// First port that looks like the microcontroller's USB serial device.
pub fn find_port() -> Option<String> {
    let ports = match serialport::available_ports() {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not list serial ports: {}", e);
            return None;
        }
    };
    debug!(
        "Available serial ports: {:?}",
        ports.iter().map(|p| &p.port_name).collect::<Vec<_>>()
    );
    pick_port(ports.into_iter().map(|p| p.port_name))
}

fn pick_port(names: impl IntoIterator<Item = String>) -> Option<String> {
    names
        .into_iter()
        .find(|name| name.contains("usbmodem") || name.contains("ttyACM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_port_prefers_microcontroller() {
        let names = ["/dev/ttyS0", "/dev/tty.usbmodem11103", "/dev/ttyACM0"]
            .map(String::from);
        assert_eq!(
            pick_port(names),
            Some("/dev/tty.usbmodem11103".to_string())
        );
        assert_eq!(pick_port(["/dev/ttyS0".to_string()]), None);
    }
}
