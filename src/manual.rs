//! Hand-built packets fed through the same whitelist → log path as decoded
//! frames.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::packet::{Packet, parse_hex_byte};
use crate::packet_log::PacketLog;

/// Default period between manual packets, in milliseconds
pub const DEFAULT_PERIOD_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualPacket {
    pub source: u8,
    pub destination: u8,
    pub data: u8,
}

impl ManualPacket {
    /// Parse the three fields from hex text, one byte each
    pub fn from_hex(source: &str, destination: &str, data: &str) -> Result<Self> {
        let byte = |text: &str| parse_hex_byte(text).ok_or_else(|| Error::InvalidHex(text.to_string()));
        Ok(Self {
            source: byte(source)?,
            destination: byte(destination)?,
            data: byte(data)?,
        })
    }

    /// Parse `SRC:DST:DATA`, e.g. `01:02:7f`
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields = text.split(':');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(source), Some(destination), Some(data), None) => {
                Self::from_hex(source, destination, data)
            }
            _ => Err(Error::InvalidHex(text.to_string())),
        }
    }

    /// Stamp the packet with a time one `period_ms` after the newest packet in
    /// the log, or 0 when the log is empty
    pub fn stamp(&self, log: &PacketLog, period_ms: u64) -> Packet {
        let time = log
            .last()
            .map_or(0, |last| last.time.saturating_add(period_ms));
        Packet::new(time, self.source, self.destination, self.data)
    }
}

/// Manual sender settings as read from the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualConfig {
    pub source: String,
    pub destination: String,
    pub data: String,
    #[serde(default = "default_period")]
    pub period_ms: u64,
}

fn default_period() -> u64 {
    DEFAULT_PERIOD_MS
}

impl ManualConfig {
    pub fn packet(&self) -> Result<ManualPacket> {
        ManualPacket::from_hex(&self.source, &self.destination, &self.data)
    }
}
