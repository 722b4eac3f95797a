use walk_tracker_data_management::{WalkStore, WalkStoreError};
use walk_tracker_lib::{route_point::RoutePoint, walk::Walk};

/// Where a finished walk goes.
#[async_trait::async_trait]
pub trait WalkRecorder: Send + Sync {
    /// Persists the walk and its route. `walk_id` of the points is filled in by the recorder.
    async fn record_walk(&self, walk: Walk, points: Vec<RoutePoint>) -> Result<Walk, WalkStoreError>;
}

#[async_trait::async_trait]
impl WalkRecorder for WalkStore {
    async fn record_walk(&self, walk: Walk, points: Vec<RoutePoint>) -> Result<Walk, WalkStoreError> {
        WalkStore::record_walk(self, walk, points).await
    }
}
