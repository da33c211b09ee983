//! Source/destination allow list.
//!
//! Acceptance is decided per axis: a packet passes when its source matches the
//! source side of *any* entry and its destination matches the destination side
//! of *any* entry, not necessarily the same one. With `[("aa", "*"), ("*", "bb")]`
//! every packet passes because both axes contain a wildcard. Pair-wise matching
//! would be a behavior change and is not done here.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::packet::to_hex;

pub const WILDCARD: &str = "*";

/// Whitelist shared between the session, the ingestion worker and callers that
/// edit it at runtime
pub type SharedWhitelist = Arc<RwLock<Whitelist>>;

/// One allow list row. Patterns are hex text or `*`; text that is not a two
/// digit hex byte simply never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub source: String,
    pub destination: String,
}

impl WhitelistEntry {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn any() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }
}

impl FromStr for WhitelistEntry {
    type Err = Error;

    /// Parse `SRC:DST`, e.g. `aa:*`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((source, destination))
                if !source.is_empty() && !destination.is_empty() && !destination.contains(':') =>
            {
                Ok(Self::new(source, destination))
            }
            _ => Err(Error::InvalidWhitelistEntry(s.to_string())),
        }
    }
}

impl fmt::Display for WhitelistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.destination)
    }
}

/// Lower-cased patterns collected from one side of every entry
#[derive(Debug, Default)]
struct AxisPatterns {
    wildcard: bool,
    literals: HashSet<String>,
}

impl AxisPatterns {
    fn collect<'a>(patterns: impl Iterator<Item = &'a str>) -> Self {
        let mut axis = Self::default();
        for pattern in patterns {
            let pattern = pattern.to_lowercase();
            if pattern == WILDCARD {
                axis.wildcard = true;
            } else {
                axis.literals.insert(pattern);
            }
        }
        axis
    }

    fn matches(&self, address: u8) -> bool {
        self.wildcard || self.literals.contains(&to_hex(address))
    }
}

/// Decide whether `(source, destination)` passes the given entries
pub fn accepts(source: u8, destination: u8, entries: &[WhitelistEntry]) -> bool {
    let sources = AxisPatterns::collect(entries.iter().map(|e| e.source.as_str()));
    let destinations = AxisPatterns::collect(entries.iter().map(|e| e.destination.as_str()));
    sources.matches(source) && destinations.matches(destination)
}

/// Ordered allow list. The per-axis pattern sets are rebuilt on every edit so
/// that checking a packet does not allocate.
#[derive(Debug)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
    sources: AxisPatterns,
    destinations: AxisPatterns,
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new(vec![WhitelistEntry::any()])
    }
}

impl Whitelist {
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        let mut whitelist = Self {
            entries,
            sources: AxisPatterns::default(),
            destinations: AxisPatterns::default(),
        };
        whitelist.rebuild();
        whitelist
    }

    pub fn shared(self) -> SharedWhitelist {
        Arc::new(RwLock::new(self))
    }

    fn rebuild(&mut self) {
        self.sources = AxisPatterns::collect(self.entries.iter().map(|e| e.source.as_str()));
        self.destinations =
            AxisPatterns::collect(self.entries.iter().map(|e| e.destination.as_str()));
    }

    pub fn accepts(&self, source: u8, destination: u8) -> bool {
        self.sources.matches(source) && self.destinations.matches(destination)
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: WhitelistEntry) {
        self.entries.push(entry);
        self.rebuild();
    }

    /// Remove the entry at `index`, returning it if it existed
    pub fn remove(&mut self, index: usize) -> Option<WhitelistEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        self.rebuild();
        Some(removed)
    }

    pub fn replace(&mut self, entries: Vec<WhitelistEntry>) {
        self.entries = entries;
        self.rebuild();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_accepts_everything() {
        let whitelist = Whitelist::default();
        for source in 0..=255u8 {
            for destination in [0u8, 0x7f, 0xff] {
                assert!(whitelist.accepts(source, destination));
            }
        }
    }

    #[test]
    fn test_per_axis_acceptance() {
        let entries = vec![WhitelistEntry::new("aa", "*"), WhitelistEntry::new("*", "bb")];
        assert!(accepts(0xaa, 0xcc, &entries));
        assert!(accepts(0xcc, 0xbb, &entries));
    }

    #[test]
    fn test_entries_do_not_pair() {
        // Source from the first entry, destination from the second
        let entries = vec![WhitelistEntry::new("01", "02"), WhitelistEntry::new("03", "04")];
        assert!(accepts(0x01, 0x04, &entries));
        assert!(accepts(0x03, 0x02, &entries));
        assert!(!accepts(0x01, 0x05, &entries));
        assert!(!accepts(0x05, 0x02, &entries));
    }

    #[test]
    fn test_case_insensitive_literals() {
        let whitelist = Whitelist::new(vec![WhitelistEntry::new("AB", "0F")]);
        assert!(whitelist.accepts(0xab, 0x0f));
        assert!(!whitelist.accepts(0xab, 0x0e));
    }

    #[test]
    fn test_invalid_patterns_never_match() {
        let whitelist = Whitelist::new(vec![
            WhitelistEntry::new("zz", "*"),
            WhitelistEntry::new("f", "*"),
        ]);
        // "f" is not the two digit form "0f"
        assert!(!whitelist.accepts(0x0f, 0x00));
        assert!(!whitelist.accepts(0x00, 0x00));
    }

    #[test]
    fn test_edit_rebuilds_patterns() {
        let mut whitelist = Whitelist::new(vec![WhitelistEntry::new("01", "02")]);
        assert!(!whitelist.accepts(0x05, 0x02));

        whitelist.push(WhitelistEntry::new("05", "02"));
        assert!(whitelist.accepts(0x05, 0x02));

        assert_eq!(whitelist.remove(1), Some(WhitelistEntry::new("05", "02")));
        assert_eq!(whitelist.remove(7), None);
        assert!(!whitelist.accepts(0x05, 0x02));

        whitelist.replace(vec![]);
        assert!(!whitelist.accepts(0x01, 0x02));
    }

    #[test]
    fn test_parse_entry() {
        let entry: WhitelistEntry = "aa:*".parse().unwrap();
        assert_eq!(entry, WhitelistEntry::new("aa", "*"));
        assert_eq!(entry.to_string(), "aa:*");
        assert!("aa".parse::<WhitelistEntry>().is_err());
        assert!(":bb".parse::<WhitelistEntry>().is_err());
        assert!("aa:bb:cc".parse::<WhitelistEntry>().is_err());
    }
}
