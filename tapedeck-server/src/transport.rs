//! Pub/sub message transport.
//!
//! Messages are opaque byte frames over TCP with length-delimited framing
//! (the transport's own framing, no application-level structure). The
//! subscriber side connects out; the publisher side binds and fans every
//! frame out to all connected subscribers through a broadcast channel.
//! Publishing is fire-and-forget: no subscribers, slow subscribers and
//! dropped connections are not errors.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use tapedeck_core::{Error, Result};

/// Frames buffered per subscriber before the oldest are dropped
const BROADCAST_CAPACITY: usize = 1024;

/// Connect-based subscribe endpoint for the inbound feed.
pub struct Subscriber {
    framed: FramedRead<TcpStream, LengthDelimitedCodec>,
    peer: SocketAddr,
}

impl Subscriber {
    /// Connect to a publisher at `addr`.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("connect to {}: {}", addr, e)))?;
        let peer = stream
            .peer_addr()
            .map_err(|e| Error::Transport(e.to_string()))?;
        debug!("subscribed to feed at {}", peer);
        Ok(Self {
            framed: FramedRead::new(stream, LengthDelimitedCodec::new()),
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Receive the next frame. `None` means the feed closed.
    ///
    /// Cancel-safe: a partially received frame stays buffered in the codec,
    /// so dropping this future mid-wait never corrupts the stream.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(Some(frame.freeze())),
            Some(Err(e)) => Err(Error::Transport(format!("receive from {}: {}", self.peer, e))),
            None => Ok(None),
        }
    }
}

/// Bind-based publish endpoint for the outbound feed.
///
/// Owns the listening socket and an accept task; each accepted subscriber
/// gets its own forwarding task fed from the broadcast channel.
pub struct Publisher {
    frames_tx: broadcast::Sender<Bytes>,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
    transport_errors: Arc<AtomicUsize>,
}

impl Publisher {
    /// Bind the publish endpoint at `addr`.
    ///
    /// `transport_errors` is incremented for every failed subscriber write
    /// so repeated failures show up in the status snapshot.
    pub async fn bind(addr: &str, transport_errors: Arc<AtomicUsize>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Transport(e.to_string()))?;
        debug!("publishing on {}", local_addr);

        let (frames_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let tx = frames_tx.clone();
        let errors = transport_errors.clone();

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("subscriber connected from {}", peer);
                        let rx = tx.subscribe();
                        tokio::spawn(forward_frames(stream, peer, rx, errors.clone()));
                    }
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        errors.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        Ok(Self {
            frames_tx,
            accept_task,
            local_addr,
            transport_errors,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Publish a frame to all connected subscribers. Fire-and-forget:
    /// returns whether at least one subscriber was connected.
    pub fn send(&self, frame: Bytes) -> bool {
        self.frames_tx.send(frame).is_ok()
    }

    pub fn transport_errors(&self) -> usize {
        self.transport_errors.load(Ordering::Relaxed)
    }

    /// Release the bound socket.
    ///
    /// The listener is guaranteed to be gone when this returns, so a
    /// subsequent bind on the same address cannot race a lingering socket.
    /// Forwarding tasks drain and exit once the channel closes.
    pub async fn close(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;
        debug!("publisher on {} closed", self.local_addr);
    }
}

async fn forward_frames(
    stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<Bytes>,
    errors: Arc<AtomicUsize>,
) {
    let mut sink = FramedWrite::new(stream, LengthDelimitedCodec::new());
    loop {
        match rx.recv().await {
            Ok(frame) => {
                if let Err(e) = sink.send(frame).await {
                    debug!("subscriber {} went away: {}", peer, e);
                    errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("subscriber {} lagged, dropped {} frames", peer, n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
