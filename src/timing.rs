//! Build timing utilities.

use std::time::{Duration, Instant};

/// Measures a named build phase, reporting when it completes.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    /// Start timing a phase.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    /// Print the elapsed time and return it, so callers can aggregate
    /// phase durations into a pipeline total.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        let secs = elapsed.as_secs_f64();
        if secs >= 60.0 {
            println!("  [{:.1}m] {}", secs / 60.0, self.name);
        } else {
            println!("  [{:.1}s] {}", secs, self.name);
        }
        elapsed
    }
}
