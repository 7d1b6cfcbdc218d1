//! The replay cursor - maps playback position advancement to record ranges.
//!
//! The replay tick loop cannot be driven by clock-update arrival: updates
//! come from a remote client at an unpredictable cadence. Instead the loop
//! polls at a short fixed interval and always computes against the latest
//! sample, tolerating updates that arrive less often than the tick rate and
//! updates that imply large jumps.
//!
//! [`ReplayCursor`] carries the state needed across ticks: the previous
//! sample (for seek detection) and the cursor, the exclusive upper bound of
//! the records already emitted.

use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{is_jump, ClockSample};
use crate::record::TimestampedLog;

/// Tunable replay behavior.
///
/// The exact values are not load-bearing beyond being small relative to the
/// seek granularity a player exposes; they exist as configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayTuning {
    /// Interval of the replay tick loop
    pub tick_interval: Duration,
    /// Position-vs-wall-clock divergence (seconds) that counts as a seek
    pub jump_threshold: f64,
    /// Trailing window (seconds) re-emitted after a seek so that messages
    /// whose effects matter near the seek point are not silently skipped
    pub backtrack_window: f64,
}

impl Default for ReplayTuning {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            jump_threshold: 0.2,
            backtrack_window: 0.1,
        }
    }
}

/// What one tick decided: the index range to emit, if any, and whether a
/// seek was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Records to (re-)publish this tick, in log order
    pub emit: Option<Range<usize>>,
    /// Whether this tick detected a discontinuity in the reported position
    pub jumped: bool,
}

impl TickOutcome {
    fn silent(jumped: bool) -> Self {
        Self { emit: None, jumped }
    }
}

/// Per-session replay state carried across ticks.
///
/// Invariant: `0 <= cursor <= log.len()`, monotonically non-decreasing
/// except when a detected jump explicitly resets it.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    prev: ClockSample,
    cursor: usize,
    tuning: ReplayTuning,
}

impl ReplayCursor {
    /// Position the cursor for a freshly loaded log.
    ///
    /// The cursor starts at the first record at or past the initially
    /// reported play position, so an old report does not cause a burst of
    /// stale messages on the first tick.
    pub fn new(log: &TimestampedLog, initial: &ClockSample, tuning: ReplayTuning) -> Self {
        Self {
            prev: *initial,
            cursor: log.first_index_at(initial.local_play_position),
            tuning,
        }
    }

    /// Exclusive upper bound of the records already emitted.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tuning(&self) -> &ReplayTuning {
        &self.tuning
    }

    /// Advance one tick.
    ///
    /// `sample` is the latest clock report; `position` is the effective
    /// playback position the caller computed from it (extrapolated while
    /// playing, frozen while paused).
    pub fn tick(
        &mut self,
        log: &TimestampedLog,
        sample: &ClockSample,
        position: f64,
    ) -> TickOutcome {
        let jumped = is_jump(&self.prev, sample, self.tuning.jump_threshold);
        self.prev = *sample;

        let target = log.first_index_at(position);

        if !sample.playing {
            // Nothing is emitted while paused, but a seek still repositions
            // the cursor so no record is skipped once playback resumes.
            if jumped {
                self.cursor = self.backtrack_index(log, position);
            }
            return TickOutcome::silent(jumped);
        }

        if jumped {
            // Re-send a small trailing window around the seek point.
            let backtrack = self.backtrack_index(log, position);
            self.cursor = target;
            return TickOutcome {
                emit: Some(backtrack..target),
                jumped: true,
            };
        }

        if target < self.cursor {
            // Position regressed without a detected seek: noise. Emit
            // nothing and leave the cursor where it is.
            return TickOutcome::silent(false);
        }

        let start = self.cursor;
        self.cursor = target;
        TickOutcome {
            emit: Some(start..target),
            jumped: false,
        }
    }

    fn backtrack_index(&self, log: &TimestampedLog, position: f64) -> usize {
        log.first_index_at((position - self.tuning.backtrack_window).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with_offsets(offsets: &[f64]) -> TimestampedLog {
        let mut log = TimestampedLog::new();
        for (i, &t) in offsets.iter().enumerate() {
            log.append(t, vec![i as u8]);
        }
        log
    }

    fn playing(remote: f64, local: f64) -> ClockSample {
        ClockSample::new(remote, local, true)
    }

    fn paused(remote: f64, local: f64) -> ClockSample {
        ClockSample::new(remote, local, false)
    }

    #[test]
    fn test_steady_playback_covers_log_without_gaps_or_duplicates() {
        let log = log_with_offsets(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);
        let initial = paused(100.0, 0.0);
        let mut cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());

        let mut emitted = Vec::new();
        // Updates advance remote time and position by the same amount, so
        // no jump is ever detected.
        for step in 1..=10 {
            let t = step as f64 * 0.1;
            let sample = playing(100.0 + t, t);
            let outcome = cursor.tick(&log, &sample, t);
            assert!(!outcome.jumped);
            if let Some(range) = outcome.emit {
                emitted.extend(range);
            }
        }

        assert_eq!(emitted, (0..log.len()).collect::<Vec<_>>());
        assert_eq!(cursor.cursor(), log.len());
    }

    #[test]
    fn test_jump_re_emits_exactly_the_backtrack_window() {
        let log = log_with_offsets(&[0.0, 1.0, 2.0, 3.0, 4.0, 4.95, 5.0, 6.0]);
        let tuning = ReplayTuning {
            backtrack_window: 0.1,
            ..ReplayTuning::default()
        };
        let initial = playing(100.0, 1.5);
        let mut cursor = ReplayCursor::new(&log, &initial, tuning);

        // Position leaps from 1.5 to 5.0 while barely any wall time passed.
        let sample = playing(100.1, 5.0);
        let outcome = cursor.tick(&log, &sample, 5.0);

        assert!(outcome.jumped);
        // Exactly the records with offset in [5.0 - 0.1, 5.0): index 5 only.
        assert_eq!(outcome.emit, Some(5..6));
        assert_eq!(cursor.cursor(), 6);
    }

    #[test]
    fn test_jump_window_is_clamped_at_zero() {
        let log = log_with_offsets(&[0.0, 0.02, 1.0]);
        let initial = playing(100.0, 2.0);
        let mut cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());

        // Seek back to very near the start: window lower bound clamps to 0.
        let sample = playing(100.1, 0.05);
        let outcome = cursor.tick(&log, &sample, 0.05);

        assert!(outcome.jumped);
        assert_eq!(outcome.emit, Some(0..2));
        assert_eq!(cursor.cursor(), 2);
    }

    #[test]
    fn test_regression_without_jump_emits_nothing() {
        let log = log_with_offsets(&[0.0, 1.0, 2.45, 3.0]);
        let initial = paused(100.0, 2.5);
        let mut cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());
        assert_eq!(cursor.cursor(), 3);

        // Position slips backward past a record, but by too little to count
        // as a seek.
        let sample = playing(100.1, 2.4);
        let outcome = cursor.tick(&log, &sample, 2.4);

        assert!(!outcome.jumped);
        assert_eq!(outcome.emit, None);
        // Cursor unchanged: no silent backward movement.
        assert_eq!(cursor.cursor(), 3);
    }

    #[test]
    fn test_paused_emits_nothing_even_on_jump() {
        let log = log_with_offsets(&[0.0, 1.0, 2.0, 3.0]);
        let initial = paused(100.0, 0.0);
        let mut cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());

        let sample = paused(100.1, 3.0);
        let outcome = cursor.tick(&log, &sample, 3.0);

        assert!(outcome.jumped);
        assert_eq!(outcome.emit, None);
    }

    #[test]
    fn test_seek_while_paused_then_resume_skips_nothing() {
        let log = log_with_offsets(&[0.0, 1.0, 2.0, 2.95, 3.0, 4.0]);
        let initial = playing(100.0, 0.5);
        let mut cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());
        assert_eq!(cursor.cursor(), 1);

        // User pauses and scrubs to 3.0: cursor repositions to the
        // backtrack index, nothing emitted yet.
        let outcome = cursor.tick(&log, &paused(100.1, 3.0), 3.0);
        assert!(outcome.jumped);
        assert_eq!(outcome.emit, None);
        assert_eq!(cursor.cursor(), 3);

        // Resume: steady advance emits from the backtrack index onward.
        let outcome = cursor.tick(&log, &playing(101.1, 4.0), 4.1);
        assert!(!outcome.jumped);
        assert_eq!(outcome.emit, Some(3..6));
        assert_eq!(cursor.cursor(), 6);
    }

    #[test]
    fn test_initial_cursor_starts_at_reported_position() {
        let log = log_with_offsets(&[0.0, 1.0, 2.0, 3.0]);
        let initial = playing(100.0, 1.5);
        let cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());
        assert_eq!(cursor.cursor(), 2);
    }

    #[test]
    fn test_no_update_between_ticks_is_quiet() {
        let log = log_with_offsets(&[0.0, 1.0, 2.0]);
        let initial = playing(100.0, 1.0);
        let mut cursor = ReplayCursor::new(&log, &initial, ReplayTuning::default());

        // The same sample observed twice (no report arrived); position only
        // moved by extrapolation.
        let outcome = cursor.tick(&log, &initial, 1.01);
        assert!(!outcome.jumped);
        assert_eq!(outcome.emit, Some(1..2));

        let outcome = cursor.tick(&log, &initial, 1.02);
        assert!(!outcome.jumped);
        assert_eq!(outcome.emit, Some(2..2));
        assert_eq!(cursor.cursor(), 2);
    }
}
