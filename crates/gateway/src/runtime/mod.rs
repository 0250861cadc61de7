pub mod error;
pub mod id_lock;
pub mod ingest;
pub mod outbox;
pub mod reconnect;
pub mod registry;
pub mod send;
pub mod session;
pub mod uploads;
pub mod webhook;

pub use error::SessionError;
pub use registry::{DeleteOutcome, NewSession, RecoveryReport, SessionRegistry};
pub use session::{SessionDeps, SessionHandle, SessionView};
