//! Shared playback clock tracker.
//!
//! A pure latest-value cache: the controller task overwrites the sample
//! whenever the remote client reports its position, the replay tick loop
//! reads it once per tick. This is the only state mutated by one task and
//! read by another, hence the lock. No interpolation happens here; the
//! replayer extrapolates from the stored update instant.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use tapedeck_core::ClockSample;

struct TrackedClock {
    sample: ClockSample,
    updated_at: Instant,
}

/// Holds the latest externally reported playback state.
pub struct ClockTracker {
    inner: RwLock<TrackedClock>,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TrackedClock {
                sample: ClockSample::default(),
                updated_at: Instant::now(),
            }),
        }
    }

    /// Atomically replace the current sample and stamp the local update time.
    ///
    /// Safe to call from any task, at arbitrary externally triggered times.
    pub fn update(&self, remote_wall_time: f64, local_play_position: f64, playing: bool) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        inner.sample = ClockSample::new(remote_wall_time, local_play_position, playing);
        inner.updated_at = Instant::now();
    }

    /// The latest sample plus the local time elapsed since it arrived.
    pub fn snapshot(&self) -> (ClockSample, Duration) {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        (inner.sample, inner.updated_at.elapsed())
    }
}

impl Default for ClockTracker {
    fn default() -> Self {
        Self::new()
    }
}
