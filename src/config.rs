//! Configuration file support.
//!
//! ```toml
//! channels = ["01->02", "02->03"]
//! window = 20
//!
//! [[whitelist]]
//! source = "01"
//! destination = "*"
//!
//! [refresh]
//! channels_ms = 100
//! topology_ms = 500
//!
//! [pacing]
//! min_gap_ms = 10
//!
//! [manual]
//! source = "01"
//! destination = "02"
//! data = "7f"
//! period_ms = 250
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelSelector, DEFAULT_WINDOW, MAX_CHANNELS};
use crate::error::{Error, Result};
use crate::manual::ManualConfig;
use crate::pacing::{DEFAULT_MIN_GAP, PacingMode};
use crate::scheduler::{CHANNEL_REFRESH, TOPOLOGY_REFRESH};
use crate::whitelist::{Whitelist, WhitelistEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Allow list rows; defaults to a single `*`/`*` row
    pub whitelist: Vec<WhitelistEntry>,
    /// Up to four channels in slot order
    pub channels: Vec<ChannelSelector>,
    /// Samples kept per channel
    pub window: usize,
    pub refresh: RefreshConfig,
    pub pacing: PacingConfig,
    pub manual: Option<ManualConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            whitelist: vec![WhitelistEntry::any()],
            channels: Vec::new(),
            window: DEFAULT_WINDOW,
            refresh: RefreshConfig::default(),
            pacing: PacingConfig::default(),
            manual: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub channels_ms: u64,
    pub topology_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            channels_ms: CHANNEL_REFRESH.as_millis() as u64,
            topology_ms: TOPOLOGY_REFRESH.as_millis() as u64,
        }
    }
}

impl RefreshConfig {
    pub fn channels(&self) -> Duration {
        Duration::from_millis(self.channels_ms)
    }

    pub fn topology(&self) -> Duration {
        Duration::from_millis(self.topology_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Replay with recorded timing (default) or without any waiting
    pub enabled: bool,
    /// Minimum wait between packets in recorded-timing mode
    pub min_gap_ms: u64,
    /// Fixed rate in packets per second; overrides recorded timing
    pub rate: Option<u64>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_gap_ms: DEFAULT_MIN_GAP,
            rate: None,
        }
    }
}

impl PacingConfig {
    pub fn mode(&self) -> PacingMode {
        match (self.enabled, self.rate) {
            (false, _) => PacingMode::Unpaced,
            (true, Some(rate)) => PacingMode::FixedRate(rate),
            (true, None) => PacingMode::Recorded {
                min_gap: self.min_gap_ms,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.len() > MAX_CHANNELS {
            return Err(Error::TooManyChannels {
                max: MAX_CHANNELS,
                got: self.channels.len(),
            });
        }
        if self.window == 0 {
            return Err(Error::Config("window must be at least 1".to_string()));
        }
        if self.refresh.channels_ms == 0 || self.refresh.topology_ms == 0 {
            return Err(Error::Config("refresh periods must be non-zero".to_string()));
        }
        if let Some(manual) = &self.manual {
            manual.packet()?;
            if manual.period_ms == 0 {
                return Err(Error::Config("manual period must be non-zero".to_string()));
            }
        }
        Ok(())
    }

    pub fn whitelist(&self) -> Whitelist {
        Whitelist::new(self.whitelist.clone())
    }

    /// Channels laid out in their four slots
    pub fn channel_slots(&self) -> [Option<ChannelSelector>; MAX_CHANNELS] {
        let mut slots = [None; MAX_CHANNELS];
        for (slot, selector) in slots.iter_mut().zip(&self.channels) {
            *slot = Some(*selector);
        }
        slots
    }
}
