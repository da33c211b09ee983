//! End-to-end: byte stream → session → log → channel and topology views.

use std::io::Cursor;
use std::sync::Arc;

use parking_lot::Mutex;

use linkscope::channel::{self, ChannelSelector};
use linkscope::generate::{self, DumpSpec};
use linkscope::topology::{self, Link};
use linkscope::{
    ChannelViews, EndReason, Frame, ManualPacket, Monitor, PacingMode, Packet, Session, Topology,
    ViewSink, Whitelist, WhitelistEntry,
};

fn encode(frames: &[(u16, u8, u8, u8)]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|&(time, source, destination, data)| {
            Frame { time, source, destination, data }.encode()
        })
        .collect()
}

#[derive(Default)]
struct Latest {
    channels: Option<ChannelViews>,
    topology: Option<Topology>,
    rows: usize,
}

struct SharedSink(Arc<Mutex<Latest>>);

impl ViewSink for SharedSink {
    fn channels(&mut self, views: &ChannelViews) {
        self.0.lock().channels = Some(views.clone());
    }

    fn topology(&mut self, topology: &Topology) {
        self.0.lock().topology = Some(topology.clone());
    }

    fn rows(&mut self, _first_index: usize, packets: &[Packet]) {
        self.0.lock().rows += packets.len();
    }
}

#[test]
fn test_stream_to_views() {
    let mut frames = Vec::new();
    for i in 0..25u16 {
        frames.push((i * 10, 0x01, 0x02, i as u8));
        frames.push((i * 10 + 5, 0x02, 0x03, 100 + i as u8));
    }
    // Dropped by the whitelist below
    frames.push((1_000, 0x09, 0x09, 0));

    let session = Session::new(
        Whitelist::new(vec![
            WhitelistEntry::new("01", "*"),
            WhitelistEntry::new("02", "*"),
        ]),
        PacingMode::Unpaced,
    );
    session.start_reader(Cursor::new(encode(&frames)), "memory").unwrap();
    let report = session.wait().unwrap();

    assert_eq!(report.end, EndReason::Exhausted);
    assert_eq!(report.frames_decoded, 51);
    assert_eq!(report.accepted, 50);
    assert_eq!(report.rejected, 1);

    let latest = Arc::new(Mutex::new(Latest::default()));
    let monitor = Monitor::new(session.log().clone(), 20, Box::new(SharedSink(latest.clone())));
    monitor.select(0, Some("01->02".parse().unwrap())).unwrap();
    monitor.select(1, Some("02->03".parse().unwrap())).unwrap();
    monitor.refresh_rows();
    monitor.refresh_channels();
    monitor.refresh_topology();

    let latest = latest.lock();
    assert_eq!(latest.rows, 50);

    let views = latest.channels.as_ref().unwrap();
    assert_eq!(views.series[0].len(), 20);
    assert_eq!(views.series[0].values[0], 24);
    assert_eq!(views.series[0].values[19], 5);
    assert_eq!(views.series[1].values[0], 124);
    assert!(views.series[2].is_empty());

    let topology = latest.topology.as_ref().unwrap();
    assert_eq!(topology.nodes, vec![1, 2, 3]);
    assert_eq!(topology.links, vec![Link { a: 1, b: 2 }, Link { a: 2, b: 3 }]);
    assert_eq!(topology.layout.len(), 3);
}

#[test]
fn test_garbage_before_first_delimiter() {
    // 40 noise bytes without a 0xFF pair leave the cursor at 40 % 19 = 2, so
    // the frame that follows is read misaligned by two bytes
    let mut bytes: Vec<u8> = (0..40u8).collect();
    bytes.extend(encode(&[(7, 0x0a, 0x0b, 0x0c)]));

    let session = Session::new(Whitelist::default(), PacingMode::Unpaced);
    session.start_reader(Cursor::new(bytes), "noisy").unwrap();
    let report = session.wait().unwrap();

    assert_eq!(report.frames_decoded, 1);
    assert_eq!(report.accepted, 1);
    // The delimiter wrapped onto offsets 0 and 1; offsets 6, 7 and 9 hold
    // frame bytes 4, 5 and 7
    assert_eq!(session.log().get(0), Some(Packet::new(0xFFFF, 0x00, 0x00, 0x0b)));
}

#[test]
fn test_manual_injection_joins_decoded_packets() {
    let session = Session::new(Whitelist::default(), PacingMode::Unpaced);
    session
        .start_reader(Cursor::new(encode(&[(500, 1, 2, 3)])), "memory")
        .unwrap();
    session.wait();

    let manual = ManualPacket::from_hex("02", "01", "ff").unwrap();
    assert!(session.inject(&manual, 100));

    let snapshot = session.log().snapshot();
    assert_eq!(snapshot.get(1), Some(&Packet::new(600, 2, 1, 0xff)));

    let topology = topology::build(&snapshot);
    assert_eq!(topology.links, vec![Link { a: 1, b: 2 }]);
    assert_eq!(topology.directed.len(), 2);

    let series = channel::extract(&snapshot, ChannelSelector::new(2, 1), 20);
    assert_eq!(series.values, vec![0xff]);
}

#[test]
fn test_generated_dump_replays() {
    let dir = std::env::temp_dir().join(format!("linkscope-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("generated.dump");

    let spec = DumpSpec {
        frames: 300,
        nodes: 5,
        seed: Some(11),
        ..DumpSpec::default()
    };
    assert_eq!(generate::write_dump(&path, &spec).unwrap(), 300);

    let session = Session::new(Whitelist::default(), PacingMode::Unpaced);
    session.start_file(&path).unwrap();
    let report = session.wait().unwrap();
    assert_eq!(report.accepted, 300);

    let expected: Vec<Packet> = generate::frames(&spec).into_iter().map(Packet::from).collect();
    let logged: Vec<Packet> = session.log().snapshot().iter().copied().collect();
    assert_eq!(logged, expected);

    std::fs::remove_dir_all(&dir).unwrap();
}
