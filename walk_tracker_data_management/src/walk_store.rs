use walk_tracker_lib::{route_point::RoutePoint, walk::Walk, walk_stats::WalkStats};

use crate::{database::db::WalkDatabase, StoreConfig, WalkStoreError, DEFAULT_RECENT_LIMIT};

/// The public interface for all walk data.
///
/// One store is opened per process and shared (`Arc<WalkStore>`) for the lifetime of the app.
/// `init` must complete before anything else is called.
pub struct WalkStore {
    pub(crate) database: WalkDatabase,
}

impl WalkStore {
    pub fn new(config: StoreConfig) -> Self {
        WalkStore {
            database: WalkDatabase::new(config),
        }
    }

    /// Convenience for `new` followed by `init`.
    pub async fn open(config: StoreConfig) -> Result<Self, WalkStoreError> {
        let store = Self::new(config);
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), WalkStoreError> {
        self.database.init().await?;
        tracing::info!("Walk store ready ({:?})", self.database.config());
        Ok(())
    }

    pub async fn close(&self) {
        self.database.close().await;
    }

    pub async fn save_walk(&self, walk: &Walk) -> Result<i64, WalkStoreError> {
        let id = self.database.insert_walk(walk).await?;
        tracing::debug!("Saved walk {id}");
        Ok(id)
    }

    pub async fn save_route_points(&self, points: &[RoutePoint]) -> Result<(), WalkStoreError> {
        self.database.insert_route_points(points).await?;
        tracing::debug!("Saved {} route points", points.len());
        Ok(())
    }

    /// Saves the walk, points the route at it and saves the route.
    /// Returns the walk with its assigned id.
    pub async fn record_walk(&self, mut walk: Walk, mut points: Vec<RoutePoint>) -> Result<Walk, WalkStoreError> {
        let walk_id = self.save_walk(&walk).await?;
        walk.id = Some(walk_id);

        if !points.is_empty() {
            points.iter_mut().for_each(|point| point.walk_id = walk_id);
            if let Err(err) = self.save_route_points(&points).await {
                tracing::error!("Walk {walk_id} saved without its route: {err}");
                return Err(err);
            }
        }

        tracing::info!("Recorded walk {walk_id} with {} route points", points.len());
        Ok(walk)
    }

    pub async fn get_route_points(&self, walk_id: i64) -> Result<Vec<RoutePoint>, WalkStoreError> {
        self.database.get_route_points(walk_id).await
    }

    pub async fn get_all_walks(&self) -> Result<Vec<Walk>, WalkStoreError> {
        self.database.get_walks().await
    }

    pub async fn get_recent_walks(&self, limit: u32) -> Result<Vec<Walk>, WalkStoreError> {
        self.database.get_recent_walks(limit).await
    }

    pub async fn get_recent_walks_default(&self) -> Result<Vec<Walk>, WalkStoreError> {
        self.get_recent_walks(DEFAULT_RECENT_LIMIT).await
    }

    pub async fn get_walk_by_id(&self, walk_id: i64) -> Result<Option<Walk>, WalkStoreError> {
        self.database.get_walk(walk_id).await
    }

    pub async fn get_walk_stats(&self) -> Result<WalkStats, WalkStoreError> {
        self.database.get_walk_stats().await
    }

    pub async fn delete_walk(&self, walk_id: i64) -> Result<(), WalkStoreError> {
        self.database.delete_walk(walk_id).await?;
        tracing::info!("Deleted walk {walk_id}");
        Ok(())
    }
}
