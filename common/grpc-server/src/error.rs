use std::io;

use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum GrpcServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server already started")]
    AlreadyStarted,

    #[error("in-flight calls did not finish before the deadline")]
    DrainTimeout,

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}
