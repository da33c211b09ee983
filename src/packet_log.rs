//! Append-only packet log shared by the ingestion worker and the view tasks.
//!
//! Packets are kept in fixed-size segments. Full segments are sealed into
//! `Arc<[Packet]>` and never touched again, so a reader can take a snapshot by
//! cloning the segment handles plus the short open tail and then scan without
//! holding any lock. The writer only waits for that clone, never for a scan.

use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::packet::Packet;

const SEGMENT_LEN: usize = 1024;

#[derive(Debug, Default)]
struct Segments {
    sealed: Vec<Arc<[Packet]>>,
    tail: Vec<Packet>,
    generation: u64,
}

impl Segments {
    fn len(&self) -> usize {
        self.sealed.len() * SEGMENT_LEN + self.tail.len()
    }

    fn get(&self, index: usize) -> Option<&Packet> {
        let segment = index / SEGMENT_LEN;
        let offset = index % SEGMENT_LEN;
        match self.sealed.get(segment) {
            Some(sealed) => sealed.get(offset),
            None if segment == self.sealed.len() => self.tail.get(offset),
            None => None,
        }
    }
}

/// Append-only packet log
#[derive(Debug, Default)]
pub struct PacketLog {
    segments: RwLock<Segments>,
}

impl PacketLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, packet: Packet) {
        let mut segments = self.segments.write();
        if segments.tail.capacity() == 0 {
            segments.tail.reserve_exact(SEGMENT_LEN);
        }
        segments.tail.push(packet);
        if segments.tail.len() == SEGMENT_LEN {
            let full = mem::take(&mut segments.tail);
            segments.sealed.push(Arc::from(full));
        }
    }

    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Packet> {
        self.segments.read().get(index).copied()
    }

    pub fn last(&self) -> Option<Packet> {
        let segments = self.segments.read();
        let len = segments.len();
        len.checked_sub(1).and_then(|index| segments.get(index).copied())
    }

    /// The most recent `n` packets in insertion order
    pub fn last_n(&self, n: usize) -> Vec<Packet> {
        let snapshot = self.snapshot();
        let start = snapshot.len().saturating_sub(n);
        snapshot.iter().skip(start).copied().collect()
    }

    /// Drop every packet; used when a new ingestion session starts
    pub fn clear(&self) {
        let mut segments = self.segments.write();
        segments.sealed.clear();
        segments.tail = Vec::new();
        segments.generation += 1;
    }

    /// Number of times the log has been cleared
    pub fn generation(&self) -> u64 {
        self.segments.read().generation
    }

    /// Capture the current contents. Packets appended afterwards are not
    /// visible through the snapshot.
    pub fn snapshot(&self) -> LogSnapshot {
        let segments = self.segments.read();
        LogSnapshot {
            sealed: segments.sealed.clone(),
            tail: segments.tail.clone(),
            generation: segments.generation,
        }
    }
}

/// Point-in-time view of a [`PacketLog`]
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    sealed: Vec<Arc<[Packet]>>,
    tail: Vec<Packet>,
    generation: u64,
}

impl LogSnapshot {
    /// Build a snapshot directly from packets; handy for offline analysis
    pub fn from_packets(packets: &[Packet]) -> Self {
        let mut sealed = Vec::new();
        let mut chunks = packets.chunks(SEGMENT_LEN).peekable();
        let mut tail = Vec::new();
        while let Some(chunk) = chunks.next() {
            if chunk.len() == SEGMENT_LEN {
                sealed.push(Arc::from(chunk));
            } else if chunks.peek().is_none() {
                tail = chunk.to_vec();
            }
        }
        Self {
            sealed,
            tail,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * SEGMENT_LEN + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation of the log when the snapshot was taken; two snapshots with
    /// the same generation share a prefix
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, index: usize) -> Option<&Packet> {
        let segment = index / SEGMENT_LEN;
        let offset = index % SEGMENT_LEN;
        match self.sealed.get(segment) {
            Some(sealed) => sealed.get(offset),
            None if segment == self.sealed.len() => self.tail.get(offset),
            None => None,
        }
    }

    /// Packets oldest first; call `.rev()` for a newest-first scan
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Packet> + '_ {
        self.sealed
            .iter()
            .flat_map(|segment| segment.iter())
            .chain(self.tail.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(time: u64) -> Packet {
        Packet::new(time, 1, 2, (time % 256) as u8)
    }

    #[test]
    fn test_append_preserves_order_across_segments() {
        let log = PacketLog::new();
        let total = SEGMENT_LEN * 2 + 5;
        for time in 0..total as u64 {
            log.append(packet(time));
        }

        assert_eq!(log.len(), total);
        assert_eq!(log.get(0), Some(packet(0)));
        assert_eq!(log.get(SEGMENT_LEN), Some(packet(SEGMENT_LEN as u64)));
        assert_eq!(log.get(total - 1), Some(packet(total as u64 - 1)));
        assert_eq!(log.get(total), None);
        assert_eq!(log.last(), Some(packet(total as u64 - 1)));

        let snapshot = log.snapshot();
        let times: Vec<u64> = snapshot.iter().map(|p| p.time).collect();
        assert_eq!(times, (0..total as u64).collect::<Vec<_>>());
        let newest: Vec<u64> = snapshot.iter().rev().take(3).map(|p| p.time).collect();
        assert_eq!(newest, vec![total as u64 - 1, total as u64 - 2, total as u64 - 3]);
    }

    #[test]
    fn test_last_n() {
        let log = PacketLog::new();
        assert!(log.last_n(5).is_empty());
        for time in 0..10 {
            log.append(packet(time));
        }
        let last: Vec<u64> = log.last_n(3).iter().map(|p| p.time).collect();
        assert_eq!(last, vec![7, 8, 9]);
        assert_eq!(log.last_n(100).len(), 10);
    }

    #[test]
    fn test_snapshot_ignores_later_appends() {
        let log = PacketLog::new();
        log.append(packet(1));
        let snapshot = log.snapshot();
        log.append(packet(2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_clear() {
        let log = PacketLog::new();
        for time in 0..(SEGMENT_LEN as u64 + 1) {
            log.append(packet(time));
        }
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.last(), None);
        log.append(packet(42));
        assert_eq!(log.get(0), Some(packet(42)));
    }

    #[test]
    fn test_clear_bumps_generation() {
        let log = PacketLog::new();
        let before = log.snapshot();
        log.append(packet(1));
        assert_eq!(log.snapshot().generation(), before.generation());

        log.clear();
        assert_eq!(log.generation(), before.generation() + 1);
        assert_eq!(log.snapshot().generation(), log.generation());
    }

    #[test]
    fn test_snapshot_from_packets() {
        let packets: Vec<Packet> = (0..(SEGMENT_LEN as u64 + 3)).map(packet).collect();
        let snapshot = LogSnapshot::from_packets(&packets);
        assert_eq!(snapshot.len(), packets.len());
        assert_eq!(snapshot.get(SEGMENT_LEN + 2), Some(&packets[SEGMENT_LEN + 2]));
        assert!(LogSnapshot::from_packets(&[]).is_empty());
    }

    #[test]
    fn test_concurrent_reader_sees_prefix() {
        let log = Arc::new(PacketLog::new());
        let writer = {
            let log = log.clone();
            std::thread::spawn(move || {
                for time in 0..5_000 {
                    log.append(packet(time));
                }
            })
        };

        for _ in 0..50 {
            let snapshot = log.snapshot();
            for (index, p) in snapshot.iter().enumerate() {
                assert_eq!(p.time, index as u64);
            }
        }
        writer.join().unwrap();
        assert_eq!(log.len(), 5_000);
    }
}
