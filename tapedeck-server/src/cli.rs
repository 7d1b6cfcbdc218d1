//! Command-line interface definition.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use tapedeck_core::ReplayTuning;

#[derive(Parser, Debug)]
#[command(
    name = "tapedeck",
    about = "Record and replay timestamped pub/sub message streams",
    version
)]
pub struct Cli {
    /// Address of the inbound feed to subscribe to when recording
    #[arg(long, default_value = "127.0.0.1:8800")]
    pub subscribe: String,

    /// Address the replay publisher binds to
    #[arg(long, default_value = "0.0.0.0:8800")]
    pub publish: String,

    /// Directory where recorded artifacts are stored
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Replay tick interval in milliseconds
    #[arg(long, default_value_t = 10)]
    pub tick_interval_ms: u64,

    /// Position-vs-wall-clock divergence in seconds that counts as a seek
    #[arg(long, default_value_t = 0.2)]
    pub jump_threshold: f64,

    /// Window in seconds re-emitted after a seek
    #[arg(long, default_value_t = 0.1)]
    pub backtrack_window: f64,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record the inbound feed until interrupted, then save
    Record {
        /// Session name; defaults to a timestamp
        #[arg(long)]
        name: Option<String>,
    },
    /// Replay a recorded session, driving the clock at real time
    Replay {
        /// Session name to replay
        name: String,
    },
    /// List stored artifacts
    List {
        /// Emit the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored artifact
    Delete {
        /// Session name to delete
        name: String,
    },
}

impl Cli {
    pub fn tuning(&self) -> ReplayTuning {
        ReplayTuning {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            jump_threshold: self.jump_threshold,
            backtrack_window: self.backtrack_window,
        }
    }
}
