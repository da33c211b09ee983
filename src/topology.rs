//! Node/link graph derived from the packet log.
//!
//! Recomputed from scratch on every refresh; nothing is carried between
//! builds, layout included.

use std::collections::HashSet;

use crate::channel::ChannelSelector;
use crate::packet_log::LogSnapshot;

/// Point every node position is rotated from
const LAYOUT_ORIGIN: (f64, f64) = (1.0, 1.0);

/// Unordered pair of distinct nodes, stored with `a` being the node that
/// appeared first in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub a: u8,
    pub b: u8,
}

impl Link {
    pub fn connects(&self, x: u8, y: u8) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    /// Distinct addresses in order of first appearance
    pub nodes: Vec<u8>,
    /// Distinct undirected links, ordered by the first-appearance index of
    /// their endpoints
    pub links: Vec<Link>,
    /// Position of `nodes[i]` on the circle
    pub layout: Vec<(f64, f64)>,
    /// Distinct directed `(source, destination)` pairs in order of first
    /// appearance; these are the channels a user can pick from
    pub directed: Vec<ChannelSelector>,
}

impl Topology {
    pub fn position_of(&self, node: u8) -> Option<(f64, f64)> {
        self.nodes
            .iter()
            .position(|&n| n == node)
            .and_then(|index| self.layout.get(index).copied())
    }
}

/// Linear re-mapping of `value` from one range onto another
pub fn map_range(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    out_min + (out_max - out_min) * ((value - in_min) / (in_max - in_min))
}

/// Rotate a point counter-clockwise around the origin
pub fn rotate(point: (f64, f64), radians: f64) -> (f64, f64) {
    let (x, y) = point;
    let (sin, cos) = radians.sin_cos();
    (x * cos - y * sin, y * cos + x * sin)
}

/// Circle positions for `count` nodes
pub fn circular_layout(count: usize) -> Vec<(f64, f64)> {
    (0..count)
        .map(|index| {
            let degrees = map_range(index as f64, 0.0, count as f64, 0.0, 360.0);
            rotate(LAYOUT_ORIGIN, degrees.to_radians())
        })
        .collect()
}

pub fn build(log: &LogSnapshot) -> Topology {
    let mut nodes = Vec::new();
    let mut seen_nodes = [false; 256];
    let mut directed = Vec::new();
    let mut seen_directed = HashSet::new();
    let mut undirected = HashSet::new();

    for packet in log.iter() {
        for address in [packet.source, packet.destination] {
            if !seen_nodes[address as usize] {
                seen_nodes[address as usize] = true;
                nodes.push(address);
            }
        }
        if seen_directed.insert(packet.link()) {
            directed.push(ChannelSelector::new(packet.source, packet.destination));
        }
        if packet.source != packet.destination {
            let (low, high) = if packet.source < packet.destination {
                (packet.source, packet.destination)
            } else {
                (packet.destination, packet.source)
            };
            undirected.insert((low, high));
        }
    }

    let mut links = Vec::new();
    for (i, &a) in nodes.iter().enumerate() {
        for &b in &nodes[i + 1..] {
            let key = if a < b { (a, b) } else { (b, a) };
            if undirected.contains(&key) {
                links.push(Link { a, b });
            }
        }
    }

    let layout = circular_layout(nodes.len());

    Topology {
        nodes,
        links,
        layout,
        directed,
    }
}
