//! # Tapedeck Server
//!
//! Records a timestamped stream of opaque messages from a pub/sub feed and
//! later replays it onto the same kind of feed in lock-step with an
//! externally controlled playback clock (a media player's reported
//! position).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    tapedeck-server                     │
//! │  ┌──────────────┐          ┌─────────────────────────┐ │
//! │  │ Recorder     │          │ Replayer                │ │
//! │  │ (pull loop)  │          │ (tick loop)             │ │
//! │  └──────┬───────┘          └───────┬────────▲────────┘ │
//! │         │ append                   │ emit   │ snapshot │
//! │         ▼                          ▼        │          │
//! │  ┌──────────────┐          ┌───────────┐ ┌──┴────────┐ │
//! │  │ Timestamped  │──save────│ Artifact  │ │ Clock     │ │
//! │  │ Log          │◀──load───│ Store     │ │ Tracker   │ │
//! │  └──────────────┘          └───────────┘ └──▲────────┘ │
//! │                                             │ update   │
//! │                    SessionControl ──────────┘          │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine itself (log, clock math, replay cursor) lives in
//! [`tapedeck_core`]; this crate adds the tokio tasks, the TCP pub/sub
//! transport, the artifact store and the session lifecycle.
//!
//! ## Key Components
//!
//! - [`session::SessionControl`] - the controller-facing surface
//! - [`recorder::ActiveRecording`] - the inbound pull loop
//! - [`replayer::ReplaySession`] - the outbound tick loop
//! - [`clock::ClockTracker`] - latest-value cache of the playback clock
//! - [`store::ArtifactStore`] - named `.tdr` artifacts on disk

extern crate tokio;

pub mod artifact;
pub mod cli;
pub mod clock;
pub mod recorder;
pub mod replayer;
pub mod session;
pub mod store;
pub mod transport;

pub use cli::{Cli, Command};
pub use session::{SessionControl, StatusSnapshot};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
