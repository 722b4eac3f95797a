use walk_tracker_data_management::WalkStoreError;

pub mod clock;
pub mod location;
pub mod recorder;
pub mod session;

pub use location::{LocationConfig, LocationError, LocationProvider, SubscriptionHandle};
pub use session::{SessionSnapshot, SessionStatus, WalkSession};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(#[source] LocationError),
    #[error("A walk is already in progress")]
    AlreadyActive,
    #[error("No walk in progress")]
    NotActive,
    /// The session was reset anyway, the walk may be lost.
    #[error("Walk may not have been saved: {0}")]
    PersistenceFailed(#[source] WalkStoreError),
}
