use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use walk_tracker_lib::coordinate::Coordinate;

mod simulated;

pub use simulated::SimulatedLocationProvider;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MIN_DISTANCE_M: f64 = 10.0;

/// How often the provider should deliver samples. A sample is due when either threshold is met.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
    pub high_accuracy: bool,
    pub min_interval: Duration,
    pub min_distance_meters: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            min_interval: DEFAULT_MIN_INTERVAL,
            min_distance_meters: DEFAULT_MIN_DISTANCE_M,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("No fix available")]
    NoFix,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location provider error: {0}")]
    Provider(String),
}

/// The device's positioning service.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_fix(&self) -> Result<Coordinate, LocationError>;

    /// Starts continuous sampling. Samples are sent in the order they were produced.
    fn subscribe(&self, config: &LocationConfig, samples: UnboundedSender<Coordinate>) -> Result<SubscriptionHandle, LocationError>;

    /// Stops a subscription. Unknown or already stopped handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
