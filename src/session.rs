//! A reading session: the packet log, the whitelist and at most one running
//! ingestion worker.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Sender, bounded};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ingest::{IngestReport, Ingestor, admit};
use crate::manual::ManualPacket;
use crate::pacing::PacingMode;
use crate::packet_log::PacketLog;
use crate::whitelist::{SharedWhitelist, Whitelist};

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<IngestReport>,
}

impl Worker {
    fn join(self) -> Option<IngestReport> {
        match self.handle.join() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Ingestion worker panicked: {:?}", e);
                None
            }
        }
    }
}

pub struct Session {
    log: Arc<PacketLog>,
    whitelist: SharedWhitelist,
    pacing: PacingMode,
    worker: Mutex<Option<Worker>>,
}

impl Session {
    pub fn new(whitelist: Whitelist, pacing: PacingMode) -> Self {
        Self {
            log: Arc::new(PacketLog::new()),
            whitelist: whitelist.shared(),
            pacing,
            worker: Mutex::new(None),
        }
    }

    pub fn log(&self) -> &Arc<PacketLog> {
        &self.log
    }

    pub fn whitelist(&self) -> &SharedWhitelist {
        &self.whitelist
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Open `path` and start ingesting it. The file is checked and opened
    /// before anything else happens, so a bad path leaves the session as it
    /// was.
    pub fn start_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| Error::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        self.start_reader(file, path.display().to_string())
    }

    /// Start ingesting any byte source on a dedicated thread. The log is
    /// cleared first.
    pub fn start_reader<R>(&self, source: R, label: impl Into<String>) -> Result<()>
    where
        R: Read + Send + 'static,
    {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.take() {
            if !worker.handle.is_finished() {
                *slot = Some(worker);
                return Err(Error::AlreadyRunning);
            }
            if let Some(report) = worker.join() {
                debug!("Collected finished session for {}", report.source);
            }
        }

        self.log.clear();

        let label = label.into();
        let (stop_tx, stop_rx) = bounded(1);
        let ingestor = Ingestor::new(self.log.clone(), self.whitelist.clone(), self.pacing, stop_rx);
        let handle = thread::Builder::new()
            .name("ingest".to_string())
            .spawn(move || ingestor.run(source, &label))?;

        *slot = Some(Worker {
            stop: stop_tx,
            handle,
        });
        info!("Ingestion started with {:?} pacing", self.pacing);
        Ok(())
    }

    /// Signal the worker to stop and wait for it. Returns `None` when nothing
    /// was running.
    pub fn stop(&self) -> Option<IngestReport> {
        let worker = self.worker.lock().take()?;
        // A full channel means a stop is already pending
        let _ = worker.stop.try_send(());
        worker.join()
    }

    /// Wait for the worker to reach the end of its source
    pub fn wait(&self) -> Option<IngestReport> {
        let worker = self.worker.lock().take()?;
        worker.join()
    }

    /// Push a hand-built packet through the whitelist. Its time is one
    /// `period_ms` after the newest logged packet.
    pub fn inject(&self, packet: &ManualPacket, period_ms: u64) -> bool {
        let stamped = packet.stamp(&self.log, period_ms);
        let accepted = admit(&self.log, &self.whitelist, stamped);
        debug!(
            "Manual packet {:02x}->{:02x} at time {} {}",
            stamped.source,
            stamped.destination,
            stamped.time,
            if accepted { "accepted" } else { "rejected" }
        );
        accepted
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.stop.try_send(());
            let _ = worker.join();
        }
    }
}
