//! Ingestion worker: byte source → frame decoder → whitelist → packet log.
//!
//! The byte source is read on its own thread and handed over in chunks, so a
//! source that blocks in `read` (a socket, a FIFO, stdin) never delays a stop.
//! A reader left blocked after a stop exits on its next read, once it finds
//! the session gone.

use std::fmt;
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select};
use tracing::{debug, info, warn};

use crate::frame::FrameDecoder;
use crate::pacing::{Pacer, PacingMode};
use crate::packet::Packet;
use crate::packet_log::PacketLog;
use crate::whitelist::SharedWhitelist;

/// Why an ingestion session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The byte source returned end of stream
    Exhausted,
    /// A stop was requested
    Stopped,
    /// Reading the byte source failed part way through
    Failed(String),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Exhausted => write!(f, "source exhausted"),
            EndReason::Stopped => write!(f, "stopped"),
            EndReason::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Summary of one ingestion session
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source: String,
    pub bytes_read: u64,
    pub frames_decoded: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub elapsed: Duration,
    pub end: EndReason,
}

const CHUNK_LEN: usize = 4096;
const CHUNK_QUEUE: usize = 16;

/// Read `source` until end of stream or error, forwarding every chunk. Stops
/// early when the receiving side is gone.
fn forward_chunks<R: Read>(mut source: R, chunks: Sender<io::Result<Vec<u8>>>) {
    let mut buf = [0u8; CHUNK_LEN];
    loop {
        let chunk = match source.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let failed = chunk.is_err();
        if chunks.send(chunk).is_err() || failed {
            return;
        }
    }
}

/// Run a packet through the whitelist and append it when accepted. This is
/// the only way packets enter the log.
pub fn admit(log: &PacketLog, whitelist: &SharedWhitelist, packet: Packet) -> bool {
    if !whitelist.read().accepts(packet.source, packet.destination) {
        return false;
    }
    log.append(packet);
    true
}

/// Drives one byte source to completion on the calling thread
pub struct Ingestor {
    log: Arc<PacketLog>,
    whitelist: SharedWhitelist,
    decoder: FrameDecoder,
    pacer: Pacer,
    stop: Receiver<()>,
}

impl Ingestor {
    pub fn new(
        log: Arc<PacketLog>,
        whitelist: SharedWhitelist,
        pacing: PacingMode,
        stop: Receiver<()>,
    ) -> Self {
        Self {
            log,
            whitelist,
            decoder: FrameDecoder::new(),
            pacer: Pacer::new(pacing),
            stop,
        }
    }

    /// A stop message or a dropped sender both end the session
    fn stop_requested(&self) -> bool {
        match self.stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    /// Wait out a pacing delay; returns true if a stop arrived meanwhile
    fn pause(&self, delay: Duration) -> bool {
        match self.stop.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    pub fn run<R>(mut self, source: R, label: &str) -> IngestReport
    where
        R: Read + Send + 'static,
    {
        let start = Instant::now();
        let mut bytes_read = 0u64;
        let mut accepted = 0u64;
        let mut rejected = 0u64;

        info!("Reading packets from {}", label);

        let (chunk_tx, chunk_rx) = bounded(CHUNK_QUEUE);
        let spawned = thread::Builder::new()
            .name("ingest-reader".to_string())
            .spawn(move || forward_chunks(source, chunk_tx));

        let end = match spawned {
            Err(e) => {
                warn!("Could not start reader for {}: {}", label, e);
                EndReason::Failed(e.to_string())
            }
            Ok(_) => 'session: loop {
                if self.stop_requested() {
                    break EndReason::Stopped;
                }

                let next = select! {
                    recv(self.stop) -> _ => Err(EndReason::Stopped),
                    recv(chunk_rx) -> msg => match msg {
                        Ok(Ok(chunk)) => Ok(chunk),
                        Ok(Err(e)) => {
                            warn!("Error reading {} after {} bytes: {}", label, bytes_read, e);
                            Err(EndReason::Failed(e.to_string()))
                        }
                        // Reader hit end of stream and hung up
                        Err(_) => Err(EndReason::Exhausted),
                    },
                };
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(end) => break end,
                };

                for byte in chunk {
                    if self.stop_requested() {
                        break 'session EndReason::Stopped;
                    }
                    bytes_read += 1;

                    let Some(frame) = self.decoder.feed(byte) else {
                        continue;
                    };

                    let packet = Packet::from(frame);
                    if !admit(&self.log, &self.whitelist, packet) {
                        rejected += 1;
                        debug!(
                            "Rejected packet {:02x}->{:02x} at time {}",
                            packet.source, packet.destination, packet.time
                        );
                        continue;
                    }
                    accepted += 1;

                    // Progress reporting
                    if accepted % 10_000 == 0 {
                        debug!("Accepted {} packets from {}", accepted, label);
                    }

                    let delay = self.pacer.delay_after(packet.time);
                    if !delay.is_zero() && self.pause(delay) {
                        break 'session EndReason::Stopped;
                    }
                }
            },
        };

        let report = IngestReport {
            source: label.to_string(),
            bytes_read,
            frames_decoded: self.decoder.frames_decoded(),
            accepted,
            rejected,
            elapsed: start.elapsed(),
            end,
        };

        info!(
            "Reading {} ended ({}): {} frames decoded, {} accepted, {} rejected",
            label, report.end, report.frames_decoded, report.accepted, report.rejected
        );
        report
    }
}
