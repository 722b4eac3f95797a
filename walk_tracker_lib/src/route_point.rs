use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// One sampled position belonging to a walk.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow), sqlx(rename_all = "camelCase"))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoutePoint {
    pub id: Option<i64>,
    pub walk_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub accuracy: Option<f64>,
}

impl RoutePoint {
    pub fn new(walk_id: i64, coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            walk_id,
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            timestamp,
            accuracy: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}
