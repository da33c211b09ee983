//! Repeating background tasks on the tokio runtime.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Refresh period of the channel views
pub const CHANNEL_REFRESH: Duration = Duration::from_millis(100);
/// Refresh period of the topology view
pub const TOPOLOGY_REFRESH: Duration = Duration::from_millis(500);

/// Owns a set of periodic jobs that all stop on one shutdown signal
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Run `job` every `period`, starting immediately. Ticks missed because a
    /// job overran are skipped rather than replayed. Must be called from
    /// within a tokio runtime.
    pub fn every<F>(&mut self, name: impl Into<String>, period: Duration, mut job: F)
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        let mut shutdown = self.shutdown.subscribe();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => job(),
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Task {} stopped", task_name);
        });

        debug!("Task {} scheduled every {:?}", name, period);
        self.tasks.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every task and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!("Task {} ended abnormally: {}", name, e);
            }
        }
    }
}
