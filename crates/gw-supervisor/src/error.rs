//! Supervisor error types.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal supervisor errors. Transient read failures never end up here.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reader process has no {0} pipe")]
    MissingPipe(&'static str),
}
