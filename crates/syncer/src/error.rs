use thiserror::Error;

/// Failure classes of the sync subsystem.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed wire message: {0}")]
    Decode(String),

    #[error("operation exceeded its deadline")]
    Timeout,

    #[error("peer closed the stream")]
    PeerGone,

    #[error("unknown data hash")]
    NotFound,

    #[error("syncer is shutting down")]
    Shutdown,

    #[error("syncer already started")]
    AlreadyStarted,

    #[error("invariant violated: {0}")]
    Internal(String),
}
