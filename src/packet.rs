use std::fmt;

/// An accepted telemetry packet as stored in the packet log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Packet {
    pub time: u64,        // Link timestamp in milliseconds, not guaranteed monotonic
    pub source: u8,       // Sending node address
    pub destination: u8,  // Receiving node address
    pub data: u8,         // Payload value
}

impl Packet {
    pub fn new(time: u64, source: u8, destination: u8, data: u8) -> Self {
        Self {
            time,
            source,
            destination,
            data,
        }
    }

    /// Directed (source, destination) pair of this packet
    pub fn link(&self) -> (u8, u8) {
        (self.source, self.destination)
    }
}

/// One row of the packet table as shown to users: position in the log plus the
/// packet fields with addresses and payload in lowercase hex.
#[derive(Debug, Clone, Copy)]
pub struct PacketRow<'a> {
    pub index: usize,
    pub packet: &'a Packet,
}

impl fmt::Display for PacketRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} time={} src={} dst={} data={}",
            self.index,
            self.packet.time,
            to_hex(self.packet.source),
            to_hex(self.packet.destination),
            to_hex(self.packet.data)
        )
    }
}

/// Two-digit lowercase hex form used for addresses everywhere (whitelist
/// matching, channel labels, table rows).
pub fn to_hex(byte: u8) -> String {
    format!("{:02x}", byte)
}

/// Parse exactly one byte from a hex string such as `"0a"` or `"FF"`.
pub fn parse_hex_byte(text: &str) -> Option<u8> {
    let text = text.trim();
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(text, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex(0x0a), "0a");
        assert_eq!(to_hex(0xff), "ff");
        assert_eq!(parse_hex_byte("0A"), Some(0x0a));
        assert_eq!(parse_hex_byte("f"), Some(0x0f));
        assert_eq!(parse_hex_byte("zz"), None);
        assert_eq!(parse_hex_byte("100"), None);
        assert_eq!(parse_hex_byte(""), None);
        assert_eq!(parse_hex_byte("+f"), None);
        assert_eq!(parse_hex_byte("-1"), None);
    }

    #[test]
    fn test_row_display() {
        let packet = Packet::new(1500, 0x01, 0xab, 0x7f);
        let row = PacketRow { index: 3, packet: &packet };
        assert_eq!(row.to_string(), "#3 time=1500 src=01 dst=ab data=7f");
    }
}
