//! The monotonic clock used for probe timestamps.

use tokio::time::Instant;

use crate::probe::Timestamp;

/// A monotonic nanosecond clock, shared by every agent in a run.
///
/// Timestamps are measured from the clock's epoch, so probe timestamps from
/// different agents can be subtracted when they come from the same clock.
///
/// Uses Tokio's clock, so paused-time tests get deterministic timestamps.
#[derive(Copy, Clone, Debug)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    /// Starts a new clock at the current instant.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Returns the nanoseconds elapsed since this clock started.
    pub fn now(&self) -> Timestamp {
        let nanos = self.epoch.elapsed().as_nanos();

        // A u64 holds more than 500 years of nanoseconds.
        Timestamp(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}
