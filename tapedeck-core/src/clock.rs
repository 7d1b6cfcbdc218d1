//! Playback clock samples and seek detection.
//!
//! The controlling client periodically reports its wall-clock time, the
//! player position and whether it is playing. The replay engine compares
//! consecutive samples: when the reported position moved by a different
//! amount than wall-clock time elapsed, the user seeked.

use serde::{Deserialize, Serialize};

/// The most recently received playback report from the controlling client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockSample {
    /// Wall-clock time on the remote client, in seconds
    pub remote_wall_time: f64,
    /// Player position on the remote client, in seconds
    pub local_play_position: f64,
    /// Whether the player is currently playing (vs paused)
    pub playing: bool,
}

impl ClockSample {
    pub fn new(remote_wall_time: f64, local_play_position: f64, playing: bool) -> Self {
        Self {
            remote_wall_time,
            local_play_position,
            playing,
        }
    }
}

impl Default for ClockSample {
    fn default() -> Self {
        Self::new(0.0, 0.0, false)
    }
}

/// Whether the position moved discontinuously between two samples.
///
/// Compares how much the remote wall clock advanced against how much the
/// play position advanced; a difference beyond `threshold` seconds means
/// the user seeked (in either direction).
pub fn is_jump(prev: &ClockSample, current: &ClockSample, threshold: f64) -> bool {
    let remote_elapsed = current.remote_wall_time - prev.remote_wall_time;
    let local_elapsed = current.local_play_position - prev.local_play_position;
    (remote_elapsed - local_elapsed).abs() > threshold
}
