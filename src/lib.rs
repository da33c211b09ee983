//! Telemetry link monitor.
//!
//! Reconstructs fixed-layout packets from an unframed serial dump, keeps the
//! ones allowed by a source/destination whitelist in an append-only log and
//! derives per-link time series and a node/link topology from that log.

pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod generate;
pub mod ingest;
pub mod manual;
pub mod pacing;
pub mod packet;
pub mod packet_log;
pub mod scheduler;
pub mod session;
pub mod topology;
pub mod views;
pub mod whitelist;

pub use channel::{ChannelSelector, ChannelSeries, ChannelViews};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Frame, FrameDecoder};
pub use ingest::{EndReason, IngestReport};
pub use manual::ManualPacket;
pub use pacing::PacingMode;
pub use packet::Packet;
pub use packet_log::{LogSnapshot, PacketLog};
pub use scheduler::Scheduler;
pub use session::Session;
pub use topology::{Link, Topology};
pub use views::{Monitor, TracingSink, ViewSink};
pub use whitelist::{Whitelist, WhitelistEntry};
