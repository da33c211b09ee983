//! Link frame decoding.
//!
//! The link does not length-prefix its frames. A frame is terminated by two
//! consecutive `0xFF` bytes, and the decoder keeps a fixed 19 byte circular
//! buffer whose cursor restarts at 0 after each delimiter. Fields are taken at
//! fixed offsets from that buffer:
//!
//! | offset | field                          |
//! |--------|--------------------------------|
//! | 0..=1  | time, u16 little endian        |
//! | 6      | source address                 |
//! | 7      | destination address            |
//! | 9      | data                           |
//!
//! There is no checksum or length check. A run of more than 19 bytes without a
//! delimiter wraps the cursor and overwrites from the start of the buffer, and
//! bytes the current frame did not reach keep whatever the previous frame left.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::packet::Packet;

pub const FRAME_LEN: usize = 19;
pub const DELIMITER: u8 = 0xFF;

const TIME_OFFSET: usize = 0;
const SOURCE_OFFSET: usize = 6;
const DESTINATION_OFFSET: usize = 7;
const DATA_OFFSET: usize = 9;

/// Fields recovered from one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub time: u16,
    pub source: u8,
    pub destination: u8,
    pub data: u8,
}

impl Frame {
    /// Extract the frame fields from a full frame buffer
    pub fn from_bytes(buffer: &[u8; FRAME_LEN]) -> Self {
        Self {
            time: LittleEndian::read_u16(&buffer[TIME_OFFSET..TIME_OFFSET + 2]),
            source: buffer[SOURCE_OFFSET],
            destination: buffer[DESTINATION_OFFSET],
            data: buffer[DATA_OFFSET],
        }
    }

    /// Build a well-formed 19 byte frame ending in the delimiter.
    ///
    /// Two adjacent `0xFF` field bytes would be read back as an early
    /// delimiter, and so would a time whose low byte is `0xFF` when the frame
    /// follows another one. [`Frame::is_wire_safe`] checks for both.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        LittleEndian::write_u16(&mut bytes[TIME_OFFSET..TIME_OFFSET + 2], self.time);
        bytes[SOURCE_OFFSET] = self.source;
        bytes[DESTINATION_OFFSET] = self.destination;
        bytes[DATA_OFFSET] = self.data;
        bytes[FRAME_LEN - 2] = DELIMITER;
        bytes[FRAME_LEN - 1] = DELIMITER;
        bytes
    }

    /// Whether the encoded frame decodes back to itself when it follows a
    /// delimiter
    pub fn is_wire_safe(&self) -> bool {
        let bytes = self.encode();
        bytes[0] != DELIMITER
            && bytes[..FRAME_LEN - 2]
                .windows(2)
                .all(|pair| pair != [DELIMITER, DELIMITER])
    }
}

impl From<Frame> for Packet {
    fn from(frame: Frame) -> Self {
        Packet::new(u64::from(frame.time), frame.source, frame.destination, frame.data)
    }
}

/// Byte-at-a-time frame decoder
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: [u8; FRAME_LEN],
    cursor: usize,
    previous: u8,
    frames: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: [0; FRAME_LEN],
            cursor: 0,
            previous: 0,
            frames: 0,
        }
    }

    /// Consume one byte, returning a frame when it completes a delimiter.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        self.buffer[self.cursor] = byte;

        if byte == DELIMITER && self.previous == DELIMITER {
            // The previous byte register is left at 0xFF, so a third 0xFF in a
            // row completes another frame straight away.
            self.cursor = 0;
            self.frames += 1;
            let frame = Frame::from_bytes(&self.buffer);
            trace!("Frame {} decoded: {:?}", self.frames, frame);
            return Some(frame);
        }

        self.previous = byte;
        self.cursor += 1;
        if self.cursor >= FRAME_LEN {
            self.cursor = 0;
        }
        None
    }

    /// Decode a whole byte slice
    pub fn decode_all(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&byte| self.feed(byte)).collect()
    }

    /// Forget all buffered bytes, as at the start of a new stream
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of frames decoded since creation or the last reset
    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
