//! Replayer - the tick loop that republishes recorded messages in lock-step
//! with the externally reported playback clock.
//!
//! The loop polls at a fixed short interval rather than reacting to clock
//! updates: updates arrive at an unpredictable cadence, so each tick reads
//! the latest sample, extrapolates the playback position while playing, and
//! lets [`ReplayCursor`] decide which record range to emit.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use tapedeck_core::{ReplayCursor, ReplayTuning, Result, TimestampedLog};

use super::clock::ClockTracker;
use super::transport::Publisher;

/// One replay session: a loaded log, the outbound publish endpoint and the
/// running tick loop, bound to a session name.
pub struct ReplaySession {
    name: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Publisher>,
    local_addr: SocketAddr,
}

impl ReplaySession {
    /// Open the outbound feed and launch the tick loop over `log`.
    ///
    /// The log must be non-empty and offset-sorted (guaranteed by artifact
    /// load); the session takes exclusive ownership of it.
    pub async fn start(
        name: &str,
        log: TimestampedLog,
        clock: Arc<ClockTracker>,
        publish_addr: &str,
        tuning: ReplayTuning,
        current_cursor: Arc<AtomicUsize>,
        transport_errors: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let publisher = Publisher::bind(publish_addr, transport_errors).await?;
        let local_addr = publisher.local_addr();

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(tick_loop(
            log,
            clock,
            publisher,
            tuning,
            current_cursor,
            stop_rx,
        ));

        info!("replaying '{}' on {}", name, local_addr);
        Ok(Self {
            name: name.to_string(),
            stop_tx,
            task,
            local_addr,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the outbound publish endpoint
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cancel the tick loop and close the outbound feed.
    ///
    /// The publish socket is released before this returns; the in-memory
    /// log is dropped with the loop.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(publisher) => publisher.close().await,
            Err(e) => error!("replay task for '{}' failed: {}", self.name, e),
        }
        info!("replay of '{}' stopped", self.name);
    }
}

async fn tick_loop(
    log: TimestampedLog,
    clock: Arc<ClockTracker>,
    publisher: Publisher,
    tuning: ReplayTuning,
    current_cursor: Arc<AtomicUsize>,
    mut stop_rx: watch::Receiver<bool>,
) -> Publisher {
    let (initial, _) = clock.snapshot();
    let mut cursor = ReplayCursor::new(&log, &initial, tuning.clone());
    current_cursor.store(cursor.cursor(), Ordering::Relaxed);

    let mut interval = tokio::time::interval(tuning.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!("tick loop started over {} records", log.len());
    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                debug!("replay stop signal received");
                break;
            }
            _ = interval.tick() => {
                let (sample, since_update) = clock.snapshot();
                // Extrapolate between updates while playing; a paused
                // player's position does not advance.
                let position = if sample.playing {
                    sample.local_play_position + since_update.as_secs_f64()
                } else {
                    sample.local_play_position
                };

                let outcome = cursor.tick(&log, &sample, position);
                if outcome.jumped {
                    debug!(
                        "playback position jumped to {:.3}, cursor now {}",
                        position,
                        cursor.cursor()
                    );
                }

                if let Some(range) = outcome.emit {
                    // All frames of one tick go out in log order
                    for index in range {
                        if let Some(record) = log.get(index) {
                            publisher.send(Bytes::copy_from_slice(&record.payload));
                        }
                    }
                }

                current_cursor.store(cursor.cursor(), Ordering::Relaxed);
            }
        }
    }

    publisher
}
