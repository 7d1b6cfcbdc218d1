//! Error types shared by the record/replay engine

use thiserror::Error;

/// Errors reported by recording, replay and artifact handling
#[derive(Error, Debug)]
pub enum Error {
    /// No artifact exists under the requested session name
    #[error("no artifact named '{name}'")]
    ArtifactNotFound { name: String },

    /// The artifact exists but contains zero records
    #[error("artifact '{name}' contains no records")]
    EmptyLog { name: String },

    /// Bind/connect/send failure on a pub/sub endpoint
    #[error("transport failure: {0}")]
    Transport(String),

    /// Stop was called with nothing recorded. A reported condition,
    /// not a failure.
    #[error("nothing recorded")]
    NoData,

    /// The persisted artifact could not be decoded
    #[error("corrupt artifact: {0}")]
    Corrupt(String),

    /// A session for another name is already active
    #[error("session '{name}' is already active, stop it first")]
    AlreadyActive { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
