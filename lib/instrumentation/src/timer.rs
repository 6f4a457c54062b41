//! Monotonic execution timing.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Final measurement from [`QueryTimer::end`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub execution_time_ms: u64,
    /// Seconds with exactly three decimal places, e.g. `"0.042"`.
    pub execution_time_seconds: String,
}

impl Timing {
    fn from_duration(elapsed: Duration) -> Self {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        Self {
            execution_time_ms: millis,
            execution_time_seconds: format!("{:.3}", millis as f64 / 1000.0),
        }
    }
}

/// Stopwatch started at construction.
#[derive(Debug, Clone, Copy)]
pub struct QueryTimer {
    started: Instant,
}

impl QueryTimer {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds since start. Can be called any number of times.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Stops the timer and reports the total.
    #[must_use]
    pub fn end(self) -> Timing {
        Timing::from_duration(self.started.elapsed())
    }
}
