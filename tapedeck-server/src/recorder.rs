//! Recorder - subscribes to the inbound feed and stamps every message with
//! the elapsed time since recording start.
//!
//! The pull loop owns its [`TimestampedLog`] exclusively and hands it back
//! when stopped, so there is never a second writer. Stopping is safe at any
//! time: the loop selects between the stop signal and the next frame, and a
//! pull interrupted mid-wait leaves no partial message behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tapedeck_core::{Result, TimestampedLog};

use super::transport::Subscriber;

/// Handle to the running pull loop of one recording session.
pub struct ActiveRecording {
    name: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<TimestampedLog>,
}

impl ActiveRecording {
    /// Connect to the inbound feed and spawn the pull loop.
    ///
    /// `records_received` is reset and then incremented per captured
    /// message; `transport_errors` counts failed pulls. Both feed the
    /// status snapshot.
    pub async fn start(
        name: &str,
        subscribe_addr: &str,
        records_received: Arc<AtomicUsize>,
        transport_errors: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let subscriber = Subscriber::connect(subscribe_addr).await?;
        records_received.store(0, Ordering::Relaxed);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pull_loop(
            subscriber,
            stop_rx,
            records_received,
            transport_errors,
        ));

        info!("recording '{}' from {}", name, subscribe_addr);
        Ok(Self {
            name: name.to_string(),
            stop_tx,
            task,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel the pull loop and take the captured log.
    ///
    /// The inbound connection is closed before this returns.
    pub async fn stop(self) -> TimestampedLog {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(log) => log,
            Err(e) => {
                error!("recording task for '{}' failed: {}", self.name, e);
                TimestampedLog::new()
            }
        }
    }
}

async fn pull_loop(
    mut subscriber: Subscriber,
    mut stop_rx: watch::Receiver<bool>,
    records_received: Arc<AtomicUsize>,
    transport_errors: Arc<AtomicUsize>,
) -> TimestampedLog {
    let mut log = TimestampedLog::new();
    let start = Instant::now();

    debug!("pull loop started");
    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                debug!("recording stop signal received");
                break;
            }
            frame = subscriber.recv() => match frame {
                Ok(Some(bytes)) => {
                    log.append(start.elapsed().as_secs_f64(), bytes.to_vec());
                    records_received.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {
                    info!("inbound feed closed after {} messages", log.len());
                    break;
                }
                Err(e) => {
                    // A single failed pull must not kill the task
                    warn!("inbound receive failed: {}", e);
                    transport_errors.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    debug!(
        "pull loop finished, {} messages in {:.3}s",
        log.len(),
        start.elapsed().as_secs_f64()
    );
    log
}
