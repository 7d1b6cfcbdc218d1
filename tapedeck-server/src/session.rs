//! Session control surface.
//!
//! [`SessionControl`] is the single owned object the controller layer talks
//! to: it enforces at-most-one active recording and at-most-one active
//! replay session per process, routes clock updates to the tracker, and
//! exposes a cheap status snapshot for telemetry display. No process-wide
//! singletons; the controller holds this by reference.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::info;
use serde::Serialize;

use tapedeck_core::{Error, ReplayTuning, Result};

use super::artifact::{load_artifact, save_artifact};
use super::clock::ClockTracker;
use super::recorder::ActiveRecording;
use super::replayer::ReplaySession;
use super::store::ArtifactStore;

/// Read-only counters for telemetry display.
///
/// Safe to take concurrently with recording and replaying; all fields are
/// plain loads of shared atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Messages captured by the active (or last) recording
    pub records_received: usize,
    /// Records in the currently loaded replay log
    pub records_loaded: usize,
    /// Replay cursor: records emitted so far (exclusive upper bound)
    pub current_cursor: usize,
    /// Accumulated transport failures across both feeds
    pub transport_errors: usize,
}

/// Owned controller-facing handle over one recorder and one replayer.
pub struct SessionControl {
    store: ArtifactStore,
    clock: Arc<ClockTracker>,
    tuning: ReplayTuning,
    subscribe_addr: String,
    publish_addr: String,
    recording: Option<ActiveRecording>,
    replay: Option<ReplaySession>,
    records_received: Arc<AtomicUsize>,
    records_loaded: Arc<AtomicUsize>,
    current_cursor: Arc<AtomicUsize>,
    transport_errors: Arc<AtomicUsize>,
}

impl SessionControl {
    pub fn new(
        store: ArtifactStore,
        subscribe_addr: String,
        publish_addr: String,
        tuning: ReplayTuning,
    ) -> Self {
        Self {
            store,
            clock: Arc::new(ClockTracker::new()),
            tuning,
            subscribe_addr,
            publish_addr,
            recording: None,
            replay: None,
            records_received: Arc::new(AtomicUsize::new(0)),
            records_loaded: Arc::new(AtomicUsize::new(0)),
            current_cursor: Arc::new(AtomicUsize::new(0)),
            transport_errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Begin capturing the inbound feed under `name`.
    ///
    /// Starting the already-active name again is a harmless no-op; while a
    /// different name is active the call is rejected until the caller stops
    /// the active one.
    pub async fn start_recording(&mut self, name: &str) -> Result<()> {
        if let Some(active) = &self.recording {
            if active.name() == name {
                info!("recording '{}' already active", name);
                return Ok(());
            }
            return Err(Error::AlreadyActive {
                name: active.name().to_string(),
            });
        }

        let recording = ActiveRecording::start(
            name,
            &self.subscribe_addr,
            self.records_received.clone(),
            self.transport_errors.clone(),
        )
        .await?;
        self.recording = Some(recording);
        Ok(())
    }

    /// Stop recording and persist the captured log under `save_key`
    /// (falling back to a timestamp name when empty).
    ///
    /// Returns whether an artifact was written. Stopping when nothing is
    /// recording, or when zero messages arrived, reports `false` rather
    /// than failing.
    pub async fn stop_recording(&mut self, save_key: &str) -> Result<bool> {
        let Some(recording) = self.recording.take() else {
            info!("stop_recording: no recording active");
            return Ok(false);
        };

        let log = recording.stop().await;
        self.records_received.store(0, Ordering::Relaxed);

        if log.is_empty() {
            info!("no messages recorded, nothing saved");
            return Ok(false);
        }

        let key = if save_key.is_empty() {
            self.store.default_name()
        } else {
            save_key.to_string()
        };
        let path = self.store.artifact_path(&key);
        save_artifact(&path, &log, false)
    }

    /// Load the artifact named `name` and start replaying it onto the
    /// outbound feed.
    ///
    /// Fails with [`Error::ArtifactNotFound`] when no such artifact exists
    /// and [`Error::EmptyLog`] when it holds zero records. If a session for
    /// a different name is active it is stopped first; the same name is a
    /// harmless no-op.
    pub async fn start_replay(&mut self, name: &str) -> Result<()> {
        if let Some(active) = &self.replay {
            if active.name() == name {
                info!("replay of '{}' already active", name);
                return Ok(());
            }
            // Never two simultaneous outbound publishers
            self.stop_replay().await;
        }

        let path = self.store.artifact_path(name);
        let log = load_artifact(&path)?;
        if log.is_empty() {
            return Err(Error::EmptyLog {
                name: name.to_string(),
            });
        }

        self.records_loaded.store(log.len(), Ordering::Relaxed);
        self.current_cursor.store(0, Ordering::Relaxed);

        let session = ReplaySession::start(
            name,
            log,
            self.clock.clone(),
            &self.publish_addr,
            self.tuning.clone(),
            self.current_cursor.clone(),
            self.transport_errors.clone(),
        )
        .await;

        match session {
            Ok(session) => {
                self.replay = Some(session);
                Ok(())
            }
            Err(e) => {
                self.records_loaded.store(0, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Stop the active replay session, if any. Idempotent; the outbound
    /// endpoint is closed before this returns.
    pub async fn stop_replay(&mut self) {
        let Some(session) = self.replay.take() else {
            info!("stop_replay: no replay active");
            return;
        };
        session.stop().await;
        self.records_loaded.store(0, Ordering::Relaxed);
        self.current_cursor.store(0, Ordering::Relaxed);
    }

    /// Whether an artifact exists under this session name
    pub fn has_artifact(&self, name: &str) -> bool {
        self.store.has_artifact(name)
    }

    /// The clock-update contract: called by the controller whenever the
    /// remote client reports its playback position. Safe from any task.
    pub fn update_clock(&self, remote_wall_time: f64, local_play_position: f64, playing: bool) {
        self.clock
            .update(remote_wall_time, local_play_position, playing);
    }

    /// Address the active replay session publishes on, if one is running.
    pub fn replay_addr(&self) -> Option<SocketAddr> {
        self.replay.as_ref().map(|s| s.local_addr())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.is_some()
    }

    /// O(1) telemetry snapshot, safe concurrently with the running tasks.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_loaded: self.records_loaded.load(Ordering::Relaxed),
            current_cursor: self.current_cursor.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::save_artifact;
    use tapedeck_core::TimestampedLog;
    use tempfile::TempDir;

    fn control_with_store(temp: &TempDir) -> SessionControl {
        SessionControl::new(
            ArtifactStore::with_base_dir(temp.path().to_path_buf()),
            "127.0.0.1:1".to_string(), // nothing listens here
            "127.0.0.1:0".to_string(),
            ReplayTuning::default(),
        )
    }

    fn store_artifact(control: &SessionControl, name: &str) {
        let mut log = TimestampedLog::new();
        log.append(0.0, b"m".to_vec());
        save_artifact(&control.store().artifact_path(name), &log, false).unwrap();
    }

    #[tokio::test]
    async fn test_replay_missing_artifact_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut control = control_with_store(&temp);

        assert!(matches!(
            control.start_replay("ghost").await,
            Err(Error::ArtifactNotFound { .. })
        ));
        assert!(!control.is_replaying());
    }

    #[tokio::test]
    async fn test_replay_same_name_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let mut control = control_with_store(&temp);
        store_artifact(&control, "one");

        control.start_replay("one").await.unwrap();
        let addr = control.replay_addr();

        // Same name again: still the same session, same endpoint
        control.start_replay("one").await.unwrap();
        assert_eq!(control.replay_addr(), addr);

        control.stop_replay().await;
    }

    #[tokio::test]
    async fn test_replay_different_name_replaces_the_session() {
        let temp = TempDir::new().unwrap();
        let mut control = control_with_store(&temp);
        store_artifact(&control, "one");
        store_artifact(&control, "two");

        control.start_replay("one").await.unwrap();
        control.start_replay("two").await.unwrap();

        assert!(control.is_replaying());
        assert_eq!(control.status().records_loaded, 1);

        control.stop_replay().await;
        assert_eq!(control.status().records_loaded, 0);
    }

    #[tokio::test]
    async fn test_stop_replay_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut control = control_with_store(&temp);

        control.stop_replay().await;
        control.stop_replay().await;
        assert!(!control.is_replaying());
    }

    #[tokio::test]
    async fn test_stop_recording_without_active_recording_reports_false() {
        let temp = TempDir::new().unwrap();
        let mut control = control_with_store(&temp);

        assert!(!control.stop_recording("whatever").await.unwrap());
    }

    #[tokio::test]
    async fn test_has_artifact() {
        let temp = TempDir::new().unwrap();
        let control = control_with_store(&temp);

        assert!(!control.has_artifact("thing"));
        store_artifact(&control, "thing");
        assert!(control.has_artifact("thing"));
    }

    #[test]
    fn test_status_snapshot_serializes_camel_case() {
        let snapshot = StatusSnapshot {
            records_received: 1,
            records_loaded: 2,
            current_cursor: 3,
            transport_errors: 0,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["recordsReceived"], 1);
        assert_eq!(json["recordsLoaded"], 2);
        assert_eq!(json["currentCursor"], 3);
    }
}
