//! # Tapedeck Core
//!
//! Platform-independent record/replay engine for timestamped message streams.
//!
//! This crate holds the pieces of tapedeck that do not touch sockets, files
//! or an async runtime:
//!
//! - [`record::TimestampedLog`] - ordered sequence of (offset, payload) records
//! - [`clock::ClockSample`] - the externally reported playback state
//! - [`cursor::ReplayCursor`] - the tick algorithm that maps playback position
//!   advancement to a contiguous range of records to emit
//!
//! The server crate (`tapedeck-server`) layers the pub/sub transport, the
//! artifact store and the long-lived tasks on top of these types.

pub mod clock;
pub mod cursor;
pub mod error;
pub mod record;

pub use clock::ClockSample;
pub use cursor::{ReplayCursor, ReplayTuning, TickOutcome};
pub use error::{Error, Result};
pub use record::{Record, TimestampedLog};
