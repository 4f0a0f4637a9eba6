//! Error type shared by the mimic crates.
//!
//! Most failures here are degradations, not aborts: callers log them and
//! carry on with a skipped save, a skipped queue entry, or default config.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file present but unusable. Callers fall back to
    /// defaults after logging.
    #[error("config: {0}")]
    Config(String),

    /// Filesystem failure touching a pattern artifact.
    #[error("artifact io at {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed artifact JSON, including a missing `events` field.
    #[error("artifact json at {path}: {source}")]
    ArtifactJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Action queue file could not be read or rewritten.
    #[error("action queue at {path}: {source}")]
    Queue {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Synthetic input controller failure during replay.
    #[error("input driver: {0}")]
    Driver(String),
}
