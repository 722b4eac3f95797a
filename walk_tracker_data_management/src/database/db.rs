use std::str::FromStr;

use const_format::concatcp;
use sqlx::{query, query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Executor, Pool, Sqlite, SqlitePool};
use tokio::sync::OnceCell;
use walk_tracker_lib::{route_point::RoutePoint, walk::Walk, walk_stats::WalkStats};

use crate::{StoreConfig, WalkStoreError};

use super::constants::*;

const CREATE_TABLES: &str = concatcp!("
    CREATE TABLE IF NOT EXISTS ", WALKS_TABLE_NAME, "(",
        ID,              " INTEGER PRIMARY KEY AUTOINCREMENT,",
        START_TIME,      " TEXT NOT NULL,",
        END_TIME,        " TEXT NOT NULL,",
        DURATION,        " INTEGER NOT NULL,",
        START_LATITUDE,  " REAL NOT NULL,",
        START_LONGITUDE, " REAL NOT NULL,",
        END_LATITUDE,    " REAL,",
        END_LONGITUDE,   " REAL,",
        DISTANCE,        " REAL,",
        CREATED_AT,      " TEXT NOT NULL);

    CREATE TABLE IF NOT EXISTS ", ROUTE_POINTS_TABLE_NAME, "(",
        ID,        " INTEGER PRIMARY KEY AUTOINCREMENT,",
        WALK_ID,   " INTEGER NOT NULL,",
        LATITUDE,  " REAL NOT NULL,",
        LONGITUDE, " REAL NOT NULL,",
        TIMESTAMP, " TEXT NOT NULL,",
        ACCURACY,  " REAL,
        FOREIGN KEY(", WALK_ID, ") REFERENCES ", WALKS_TABLE_NAME, "(", ID, ") ON DELETE CASCADE);

    CREATE INDEX IF NOT EXISTS ", ROUTE_POINTS_WALK_INDEX, " ON ", ROUTE_POINTS_TABLE_NAME, "(", WALK_ID, ");
");

const SELECT_WALKS_NEWEST_FIRST: &str = concatcp!(
    "SELECT * FROM ", WALKS_TABLE_NAME, " ORDER BY ", CREATED_AT, " DESC, ", ID, " DESC");

/// SQL access to the walk tables. Every operation fails with `NotInitialized` until `init` has completed.
pub struct WalkDatabase {
    config: StoreConfig,
    pool: OnceCell<Pool<Sqlite>>,
}

impl WalkDatabase {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    /// Opens the database and makes sure the tables exist. Safe to call more than once.
    ///
    /// The pool is only kept once the schema is in place, so a failed init can be retried.
    pub async fn init(&self) -> Result<(), WalkStoreError> {
        self.pool.get_or_try_init(|| async {
            let pool = self.connect().await?;

            if let Err(err) = pool.execute(CREATE_TABLES).await {
                pool.close().await;
                return Err(WalkStoreError::Open(format!("Failed to create tables: {err}")));
            }

            Ok(pool)
        }).await?;

        Ok(())
    }

    async fn connect(&self) -> Result<Pool<Sqlite>, WalkStoreError> {
        match &self.config {
            StoreConfig::File(path) => {
                if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                    if !dir.exists() {
                        tokio::fs::create_dir_all(dir).await?;
                    }
                }

                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .foreign_keys(true)
                    .create_if_missing(true);

                SqlitePool::connect_with(options).await
                    .map_err(|err| WalkStoreError::Open(format!("Failed to connect to {path:?}: {err}")))
            }
            StoreConfig::InMemory => {
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|err| WalkStoreError::Open(err.to_string()))?
                    .foreign_keys(true);

                // Every connection to :memory: is its own database, so pin a single one for good
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options).await
                    .map_err(|err| WalkStoreError::Open(format!("Failed to open in-memory database: {err}")))
            }
        }
    }

    /// Waits for open connections to finish and closes them.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&Pool<Sqlite>, WalkStoreError> {
        self.pool.get().ok_or(WalkStoreError::NotInitialized)
    }

    pub async fn insert_walk(&self, walk: &Walk) -> Result<i64, WalkStoreError> {
        query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", WALKS_TABLE_NAME, "(",
            ID, ", ", START_TIME, ", ", END_TIME, ", ", DURATION, ", ", START_LATITUDE, ", ", START_LONGITUDE, ", ",
            END_LATITUDE, ", ", END_LONGITUDE, ", ", DISTANCE, ", ", CREATED_AT, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) RETURNING ", ID))
                .bind(walk.start_time)
                .bind(walk.end_time)
                .bind(walk.duration)
                .bind(walk.start_latitude)
                .bind(walk.start_longitude)
                .bind(walk.end_latitude)
                .bind(walk.end_longitude)
                .bind(walk.distance)
                .bind(walk.created_at)
                .fetch_one(self.pool()?).await
                .map_err(|err| WalkStoreError::WriteFailed(format!("Failed to insert walk: {err}")))
                .map(|row| row.0)
    }

    /// All or nothing: the first failing insert rolls back the whole batch.
    pub async fn insert_route_points(&self, points: &[RoutePoint]) -> Result<(), WalkStoreError> {
        if points.is_empty() {
            return Err(WalkStoreError::EmptyBatch);
        }

        let mut tx = self.pool()?.begin().await
            .map_err(|err| WalkStoreError::WriteFailed(format!("Failed to begin transaction: {err}")))?;

        for (index, point) in points.iter().enumerate() {
            let inserted = query(concatcp!("
                INSERT INTO ", ROUTE_POINTS_TABLE_NAME, "(",
                ID, ", ", WALK_ID, ", ", LATITUDE, ", ", LONGITUDE, ", ", TIMESTAMP, ", ", ACCURACY, ")
                VALUES (NULL, ?1, ?2, ?3, ?4, ?5)"))
                    .bind(point.walk_id)
                    .bind(point.latitude)
                    .bind(point.longitude)
                    .bind(point.timestamp)
                    .bind(point.accuracy)
                    .execute(&mut *tx).await;

            if let Err(err) = inserted {
                tracing::warn!("Route point {index} of {} rejected, rolling back: {err}", points.len());
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback failed: {rollback_err}");
                }
                return Err(WalkStoreError::WriteFailed(format!("Failed to insert route point {index}: {err}")));
            }
        }

        tx.commit().await
            .map_err(|err| WalkStoreError::WriteFailed(format!("Failed to commit route points: {err}")))
    }

    pub async fn get_route_points(&self, walk_id: i64) -> Result<Vec<RoutePoint>, WalkStoreError> {
        query_as::<_, RoutePoint>(concatcp!(
            "SELECT * FROM ", ROUTE_POINTS_TABLE_NAME, " WHERE ", WALK_ID, " = ?1 ORDER BY ", TIMESTAMP, " ASC, ", ID, " ASC"))
                .bind(walk_id)
                .fetch_all(self.pool()?).await
                .map_err(|err| WalkStoreError::ReadFailed(format!("Failed to get route points: {err}")))
    }

    pub async fn get_walks(&self) -> Result<Vec<Walk>, WalkStoreError> {
        query_as::<_, Walk>(SELECT_WALKS_NEWEST_FIRST)
            .fetch_all(self.pool()?).await
            .map_err(|err| WalkStoreError::ReadFailed(format!("Failed to get walks: {err}")))
    }

    pub async fn get_recent_walks(&self, limit: u32) -> Result<Vec<Walk>, WalkStoreError> {
        query_as::<_, Walk>(concatcp!(SELECT_WALKS_NEWEST_FIRST, " LIMIT ?1"))
            .bind(i64::from(limit))
            .fetch_all(self.pool()?).await
            .map_err(|err| WalkStoreError::ReadFailed(format!("Failed to get recent walks: {err}")))
    }

    pub async fn get_walk(&self, walk_id: i64) -> Result<Option<Walk>, WalkStoreError> {
        query_as::<_, Walk>(concatcp!("SELECT * FROM ", WALKS_TABLE_NAME, " WHERE ", ID, " = ?1"))
            .bind(walk_id)
            .fetch_optional(self.pool()?).await
            .map_err(|err| WalkStoreError::ReadFailed(format!("Failed to get walk: {err}")))
    }

    pub async fn get_walk_stats(&self) -> Result<WalkStats, WalkStoreError> {
        query_as::<_, WalkStats>(concatcp!("
            SELECT
                COUNT(*) AS totalWalks,
                COALESCE(SUM(", DURATION, "), 0) AS totalDuration,
                CAST(COALESCE(SUM(", DISTANCE, "), 0) AS REAL) AS totalDistance,
                CAST(COALESCE(AVG(", DURATION, "), 0) AS REAL) AS averageDuration
            FROM ", WALKS_TABLE_NAME))
                .fetch_one(self.pool()?).await
                .map_err(|err| WalkStoreError::ReadFailed(format!("Failed to get walk stats: {err}")))
    }

    /// Route points go first, then the walk, in one transaction. A failure leaves both tables as they were.
    pub async fn delete_walk(&self, walk_id: i64) -> Result<(), WalkStoreError> {
        let mut tx = self.pool()?.begin().await
            .map_err(|err| WalkStoreError::WriteFailed(format!("Failed to begin transaction: {err}")))?;

        let deleted = async {
            query(concatcp!("DELETE FROM ", ROUTE_POINTS_TABLE_NAME, " WHERE ", WALK_ID, " = ?1"))
                .bind(walk_id)
                .execute(&mut *tx).await?;

            query(concatcp!("DELETE FROM ", WALKS_TABLE_NAME, " WHERE ", ID, " = ?1"))
                .bind(walk_id)
                .execute(&mut *tx).await?;

            Ok::<_, sqlx::Error>(())
        }.await;

        if let Err(err) = deleted {
            tracing::warn!("Deleting walk {walk_id} failed, rolling back: {err}");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed: {rollback_err}");
            }
            return Err(WalkStoreError::WriteFailed(format!("Failed to delete walk {walk_id}: {err}")));
        }

        tx.commit().await
            .map_err(|err| WalkStoreError::WriteFailed(format!("Failed to commit delete: {err}")))
    }
}
