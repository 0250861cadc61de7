use sr_transport::TransportError;

/// Failures of registry and session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} already exists")]
    AlreadyExists(String),

    /// The operation needs a `ready` session.
    #[error("session {0} is not ready")]
    NotReady(String),

    /// Destructive operations wait until bring-up has settled.
    #[error("session {0} is not ready for actions yet")]
    NotReadyForAction(String),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("store: {0}")]
    Store(#[from] sr_domain::error::Error),

    #[error("session {0} is shutting down")]
    Shutdown(String),
}
