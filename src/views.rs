//! Hand-off of derived views to whatever renders them.
//!
//! [`Monitor`] reads the shared packet log, runs the channel extractor and the
//! topology builder and passes the results to a [`ViewSink`]. It never writes
//! to the log.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::channel::{self, ChannelSelector, ChannelViews, MAX_CHANNELS};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketRow, to_hex};
use crate::packet_log::PacketLog;
use crate::topology::{self, Topology};

/// Receiver of derived views, e.g. a plot widget or a table
pub trait ViewSink: Send {
    /// Latest series of the four channel slots
    fn channels(&mut self, views: &ChannelViews);

    /// Latest topology
    fn topology(&mut self, topology: &Topology);

    /// Packets appended since the previous call; `first_index` is the log
    /// position of `packets[0]`
    fn rows(&mut self, first_index: usize, packets: &[Packet]);
}

/// Sink that writes everything to the tracing log
#[derive(Debug, Default)]
pub struct TracingSink {
    announced_channels: usize,
    nodes: usize,
    links: usize,
}

impl ViewSink for TracingSink {
    fn channels(&mut self, views: &ChannelViews) {
        for (slot, (selector, series)) in views.selectors.iter().zip(&views.series).enumerate() {
            if let Some(selector) = selector {
                debug!(
                    "Channel {} {}: {} samples {:?}",
                    slot + 1,
                    selector,
                    series.len(),
                    series.chronological()
                );
            }
        }
    }

    fn topology(&mut self, topology: &Topology) {
        // New directed links are what a user could now select as a channel
        if topology.directed.len() < self.announced_channels {
            self.announced_channels = 0;
        }
        for selector in &topology.directed[self.announced_channels..] {
            info!("New link available: {}", selector);
        }
        self.announced_channels = topology.directed.len();

        if topology.nodes.len() != self.nodes || topology.links.len() != self.links {
            let nodes: Vec<String> = topology.nodes.iter().map(|&n| to_hex(n)).collect();
            let links: Vec<String> = topology
                .links
                .iter()
                .map(|l| format!("{}-{}", to_hex(l.a), to_hex(l.b)))
                .collect();
            info!("Topology: nodes {:?}, links {:?}", nodes, links);
            self.nodes = topology.nodes.len();
            self.links = topology.links.len();
        }
    }

    fn rows(&mut self, first_index: usize, packets: &[Packet]) {
        for (offset, packet) in packets.iter().enumerate() {
            debug!("{}", PacketRow { index: first_index + offset, packet });
        }
    }
}

/// Position of the table cursor within one log generation
#[derive(Debug, Default, Clone, Copy)]
struct RowCursor {
    generation: u64,
    seen: usize,
}

/// Periodic reader of the packet log
pub struct Monitor {
    log: Arc<PacketLog>,
    selectors: RwLock<[Option<ChannelSelector>; MAX_CHANNELS]>,
    window: usize,
    rows: Mutex<RowCursor>,
    sink: Mutex<Box<dyn ViewSink>>,
}

impl Monitor {
    pub fn new(log: Arc<PacketLog>, window: usize, sink: Box<dyn ViewSink>) -> Self {
        Self {
            log,
            selectors: RwLock::new([None; MAX_CHANNELS]),
            window,
            rows: Mutex::new(RowCursor::default()),
            sink: Mutex::new(sink),
        }
    }

    /// Put `selector` in channel slot `slot` (0-based); `None` clears it
    pub fn select(&self, slot: usize, selector: Option<ChannelSelector>) -> Result<()> {
        if slot >= MAX_CHANNELS {
            return Err(Error::TooManyChannels {
                max: MAX_CHANNELS,
                got: slot + 1,
            });
        }
        self.selectors.write()[slot] = selector;
        Ok(())
    }

    pub fn selectors(&self) -> [Option<ChannelSelector>; MAX_CHANNELS] {
        *self.selectors.read()
    }

    pub fn refresh_channels(&self) -> ChannelViews {
        let snapshot = self.log.snapshot();
        let views = channel::extract_many(&snapshot, &self.selectors(), self.window);
        self.sink.lock().channels(&views);
        views
    }

    pub fn refresh_topology(&self) -> Topology {
        let snapshot = self.log.snapshot();
        let topology = topology::build(&snapshot);
        self.sink.lock().topology(&topology);
        topology
    }

    /// Hand packets appended since the last call to the sink. A log that
    /// was cleared for a new session restarts rows from 0.
    pub fn refresh_rows(&self) -> usize {
        let snapshot = self.log.snapshot();
        let mut cursor = self.rows.lock();
        if snapshot.generation() != cursor.generation {
            *cursor = RowCursor {
                generation: snapshot.generation(),
                seen: 0,
            };
        }
        let fresh: Vec<Packet> = snapshot.iter().skip(cursor.seen).copied().collect();
        if !fresh.is_empty() {
            self.sink.lock().rows(cursor.seen, &fresh);
        }
        cursor.seen = snapshot.len();
        fresh.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorded {
        channels: Vec<ChannelViews>,
        topologies: Vec<Topology>,
        rows: Vec<(usize, usize)>,
    }

    struct RecordingSink(Arc<Mutex<Recorded>>);

    impl ViewSink for RecordingSink {
        fn channels(&mut self, views: &ChannelViews) {
            self.0.lock().channels.push(views.clone());
        }

        fn topology(&mut self, topology: &Topology) {
            self.0.lock().topologies.push(topology.clone());
        }

        fn rows(&mut self, first_index: usize, packets: &[Packet]) {
            self.0.lock().rows.push((first_index, packets.len()));
        }
    }

    fn monitor() -> (Arc<PacketLog>, Monitor, Arc<Mutex<Recorded>>) {
        let log = Arc::new(PacketLog::new());
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let monitor = Monitor::new(log.clone(), 3, Box::new(RecordingSink(recorded.clone())));
        (log, monitor, recorded)
    }

    #[test]
    fn test_channels_use_selected_slots() {
        let (log, monitor, recorded) = monitor();
        for i in 0..5 {
            log.append(Packet::new(i, 1, 2, i as u8));
        }
        monitor.select(2, Some(ChannelSelector::new(1, 2))).unwrap();

        let views = monitor.refresh_channels();
        assert!(views.series[0].is_empty());
        assert_eq!(views.series[2].values, vec![4, 3, 2]);
        assert_eq!(recorded.lock().channels.len(), 1);

        assert!(matches!(monitor.select(4, None), Err(Error::TooManyChannels { .. })));
    }

    #[test]
    fn test_topology_reaches_sink() {
        let (log, monitor, recorded) = monitor();
        log.append(Packet::new(0, 1, 2, 0));
        let topology = monitor.refresh_topology();
        assert_eq!(topology.nodes, vec![1, 2]);
        assert_eq!(recorded.lock().topologies[0], topology);
    }

    #[test]
    fn test_rows_are_incremental() {
        let (log, monitor, recorded) = monitor();
        assert_eq!(monitor.refresh_rows(), 0);

        log.append(Packet::new(0, 1, 2, 0));
        log.append(Packet::new(1, 1, 2, 0));
        assert_eq!(monitor.refresh_rows(), 2);
        log.append(Packet::new(2, 1, 2, 0));
        assert_eq!(monitor.refresh_rows(), 1);

        log.clear();
        log.append(Packet::new(0, 3, 4, 0));
        assert_eq!(monitor.refresh_rows(), 1);

        assert_eq!(recorded.lock().rows, vec![(0, 2), (2, 1), (0, 1)]);
    }

    #[test]
    fn test_rows_restart_when_log_regrows_past_cursor() {
        let (log, monitor, recorded) = monitor();
        for i in 0..3 {
            log.append(Packet::new(i, 1, 2, 0));
        }
        assert_eq!(monitor.refresh_rows(), 3);

        log.clear();
        for i in 0..4 {
            log.append(Packet::new(i, 3, 4, 0));
        }
        assert_eq!(monitor.refresh_rows(), 4);
        assert_eq!(recorded.lock().rows, vec![(0, 3), (0, 4)]);
    }

    #[test]
    fn test_tracing_sink_handles_shrinking_topology() {
        let mut sink = TracingSink::default();
        let mut topology = Topology::default();
        topology.directed = vec![ChannelSelector::new(1, 2), ChannelSelector::new(2, 3)];
        sink.topology(&topology);
        topology.directed.truncate(1);
        sink.topology(&topology);
        assert_eq!(sink.announced_channels, 1);
    }
}
