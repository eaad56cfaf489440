use std::io;

use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server already started")]
    AlreadyStarted,

    #[error("in-flight requests did not finish before the deadline")]
    DrainTimeout,

    #[error("server error: {0}")]
    Serve(#[from] io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}
