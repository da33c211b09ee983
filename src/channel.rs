//! Channel extraction: the most recent samples of selected directed links.
//!
//! Series are collected by scanning the log from its newest packet backwards,
//! and the output vectors are filled in that scan order, so index 0 is the
//! newest sample. [`ChannelSeries::chronological`] gives the oldest-first view.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::packet::{Packet, parse_hex_byte, to_hex};
use crate::packet_log::LogSnapshot;

pub const MAX_CHANNELS: usize = 4;
pub const DEFAULT_WINDOW: usize = 20;

/// Directed link whose payload values form a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelSelector {
    pub source: u8,
    pub destination: u8,
}

impl ChannelSelector {
    pub fn new(source: u8, destination: u8) -> Self {
        Self { source, destination }
    }

    pub fn matches(&self, packet: &Packet) -> bool {
        packet.source == self.source && packet.destination == self.destination
    }
}

impl FromStr for ChannelSelector {
    type Err = Error;

    /// Parse the `aa->bb` label form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, destination) = s
            .split_once("->")
            .ok_or_else(|| Error::InvalidSelector(s.to_string()))?;
        match (parse_hex_byte(source), parse_hex_byte(destination)) {
            (Some(source), Some(destination)) => Ok(Self::new(source, destination)),
            _ => Err(Error::InvalidSelector(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChannelSelector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelSelector> for String {
    fn from(selector: ChannelSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", to_hex(self.source), to_hex(self.destination))
    }
}

/// Samples of one channel, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSeries {
    pub times: Vec<u64>,
    pub values: Vec<u8>,
}

impl ChannelSeries {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, packet: &Packet) {
        self.times.push(packet.time);
        self.values.push(packet.data);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(time, value)` pairs oldest first
    pub fn chronological(&self) -> Vec<(u64, u8)> {
        self.times
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .rev()
            .collect()
    }
}

/// Series for each of the four channel slots. A slot without a selector
/// always carries an empty series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelViews {
    pub selectors: [Option<ChannelSelector>; MAX_CHANNELS],
    pub series: [ChannelSeries; MAX_CHANNELS],
}

/// Collect the newest `window` samples of one channel
pub fn extract(log: &LogSnapshot, selector: ChannelSelector, window: usize) -> ChannelSeries {
    let views = extract_many(log, &[Some(selector)], window);
    let [series, ..] = views.series;
    series
}

/// Collect up to four channels in a single backward pass. Each slot stops on
/// its own once it has `window` samples; the pass ends when every selected
/// slot is full or the start of the log is reached.
pub fn extract_many(
    log: &LogSnapshot,
    selectors: &[Option<ChannelSelector>],
    window: usize,
) -> ChannelViews {
    let mut views = ChannelViews::default();
    for (slot, selector) in selectors.iter().take(MAX_CHANNELS).enumerate() {
        views.selectors[slot] = *selector;
        views.series[slot] = ChannelSeries::with_capacity(if selector.is_some() { window } else { 0 });
    }

    let active = views.selectors.iter().filter(|s| s.is_some()).count();
    if active == 0 || window == 0 {
        return views;
    }

    let mut full = 0;
    for packet in log.iter().rev() {
        for (selector, series) in views.selectors.iter().zip(views.series.iter_mut()) {
            let Some(selector) = selector else {
                continue;
            };
            if series.len() < window && selector.matches(packet) {
                series.push(packet);
                if series.len() == window {
                    full += 1;
                }
            }
        }
        if full == active {
            break;
        }
    }

    views
}
