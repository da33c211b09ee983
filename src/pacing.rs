use std::time::{Duration, Instant};

/// Smallest gap between two replayed packets in recorded-timing mode, in link
/// time units (milliseconds)
pub const DEFAULT_MIN_GAP: u64 = 10;

/// Replay mode for packet timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingMode {
    /// Wait the recorded gap between consecutive accepted packets, never less
    /// than `min_gap` milliseconds. Gaps that go backwards also wait `min_gap`.
    Recorded { min_gap: u64 },
    /// Fixed rate in packets per second
    FixedRate(u64),
    /// No waiting at all
    Unpaced,
}

impl Default for PacingMode {
    fn default() -> Self {
        PacingMode::Recorded {
            min_gap: DEFAULT_MIN_GAP,
        }
    }
}

/// Works out how long the ingestion worker should wait before handing on the
/// next accepted packet. The worker does the waiting itself so that a stop
/// request can interrupt it.
#[derive(Debug)]
pub struct Pacer {
    mode: PacingMode,
    interval: Duration, // Used for fixed rate mode
    last_time: Option<u64>,
    last_release: Option<Instant>,
}

impl Pacer {
    pub fn new(mode: PacingMode) -> Self {
        let interval = match mode {
            PacingMode::FixedRate(rate) if rate > 0 => Duration::from_nanos(1_000_000_000 / rate),
            PacingMode::FixedRate(_) => Duration::from_secs(1), // 1 second for zero rate
            _ => Duration::ZERO,
        };

        Self {
            mode,
            interval,
            last_time: None,
            last_release: None,
        }
    }

    pub fn mode(&self) -> PacingMode {
        self.mode
    }

    /// Record an accepted packet with link time `time` and return the delay to
    /// apply after it. The first packet never waits.
    pub fn delay_after(&mut self, time: u64) -> Duration {
        let previous = self.last_time.replace(time);
        match self.mode {
            PacingMode::Unpaced => Duration::ZERO,
            PacingMode::Recorded { min_gap } => match previous {
                None => Duration::ZERO,
                Some(previous) => {
                    let gap = time.saturating_sub(previous).max(min_gap);
                    Duration::from_millis(gap)
                }
            },
            PacingMode::FixedRate(_) => {
                let now = Instant::now();
                let delay = match self.last_release {
                    None => Duration::ZERO,
                    Some(last) => self.interval.saturating_sub(now.duration_since(last)),
                };
                self.last_release = Some(now + delay);
                delay
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_time = None;
        self.last_release = None;
    }
}
