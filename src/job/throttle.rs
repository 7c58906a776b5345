use std::time::Duration;
use tokio::time::Instant;

/// Whether a progress update may be shown at `now`.
///
/// The first update (no previous emit) is always allowed. Pure: calling it again with
/// the same inputs gives the same answer.
pub fn allow(now: Instant, last_emit: Option<Instant>, min_interval: Duration) -> bool {
    match last_emit {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= min_interval,
    }
}

/// Rate limit for the edits of one job's status message.
///
/// Only updates that were actually delivered should be passed to [`record`](Self::record);
/// skipped or failed updates leave the timestamp untouched.
#[derive(Debug, Clone)]
pub struct ProgressThrottler {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    pub fn allow(&self, now: Instant) -> bool {
        allow(now, self.last_emit, self.min_interval)
    }

    pub fn record(&mut self, now: Instant) {
        self.last_emit = Some(now);
    }
}
