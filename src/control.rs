use crate::types::{ControlInput, RgbPacket};
use byteorder::{LittleEndian, ReadBytesExt};
use crossbeam_channel::Receiver;
use log::debug;
use std::io::Cursor;

/// Binary protocol from the control desk microcontroller:
///
/// | Offset | Size | Field                              |
/// |--------|------|------------------------------------|
/// | 0      | 1    | kind (`b'p'` knob, `b'b'` button)  |
/// | 1      | 1    | index                              |
/// | 2      | 2    | value (u16 LE, knob 0–4094, button 0/1) |
///
/// Flood-light packets going the other way are `[light_index, r, g, b]`.
pub const CONTROL_PACKET_SIZE: usize = 4;
pub const RGB_PACKET_SIZE: usize = 4;

const KIND_KNOB: u8 = b'p';
const KIND_BUTTON: u8 = b'b';
/// Raw knob reading at full deflection.
const KNOB_FULL_SCALE: f64 = 4094.0;

/// Non-blocking source of control desk input.
pub trait ControlInputSource {
    /// Next pending input, or `None` without waiting.
    fn poll(&mut self) -> Option<ControlInput>;
}

/// Input arriving from another thread (serial link, knob simulator thread).
pub struct ChannelInput {
    rx: Receiver<ControlInput>,
}

impl ChannelInput {
    pub fn new(rx: Receiver<ControlInput>) -> Self {
        Self { rx }
    }
}

impl ControlInputSource for ChannelInput {
    fn poll(&mut self) -> Option<ControlInput> {
        self.rx.try_recv().ok()
    }
}

/// No control desk attached.
#[derive(Debug, Default)]
pub struct NoInput;

impl ControlInputSource for NoInput {
    fn poll(&mut self) -> Option<ControlInput> {
        None
    }
}

pub fn parse_control_packet(data: &[u8]) -> Result<ControlInput, String> {
    if data.len() != CONTROL_PACKET_SIZE {
        return Err(format!("wrong size: {}", data.len()));
    }
    let mut cursor = Cursor::new(data);
    let kind = cursor.read_u8().map_err(|e| e.to_string())?;
    let index = cursor.read_u8().map_err(|e| e.to_string())?;
    let value = cursor
        .read_u16::<LittleEndian>()
        .map_err(|e| e.to_string())?;

    match kind {
        KIND_KNOB => Ok(ControlInput::knob(index, value as f64 / KNOB_FULL_SCALE)),
        KIND_BUTTON => Ok(ControlInput::button(index, value != 0)),
        other => Err(format!("bad kind: 0x{:02X}", other)),
    }
}

pub fn encode_rgb_packet(packet: &RgbPacket) -> [u8; RGB_PACKET_SIZE] {
    let [r, g, b] = packet.rgb;
    [packet.light_index, r, g, b]
}

/// Splits a byte stream into control packets, resynchronising on the kind
/// byte after garbage.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buf: Vec<u8>,
    errors: u64,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<ControlInput> {
        self.buf.extend_from_slice(data);
        let mut out = Vec::new();
        while self.buf.len() >= CONTROL_PACKET_SIZE {
            match self.buf.iter().position(|b| *b == KIND_KNOB || *b == KIND_BUTTON) {
                Some(0) => {}
                Some(skip) => {
                    debug!("Skipping {} bytes to packet start", skip);
                    self.buf.drain(..skip);
                    continue;
                }
                None => {
                    self.buf.clear();
                    break;
                }
            }
            let packet: Vec<u8> = self.buf.drain(..CONTROL_PACKET_SIZE).collect();
            match parse_control_packet(&packet) {
                Ok(input) => out.push(input),
                Err(e) => {
                    self.errors += 1;
                    debug!("Control packet error: {}", e);
                }
            }
        }
        out
    }
}
