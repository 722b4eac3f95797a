use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// A completed walk. `id` is assigned by the store and is `None` until the walk has been saved.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow), sqlx(rename_all = "camelCase"))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Walk {
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole seconds
    pub duration: i64,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: Option<f64>,
    pub end_longitude: Option<f64>,
    /// Meters
    pub distance: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Walk {
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        start_location: Coordinate,
        end_location: Option<Coordinate>,
        distance: Option<f64>,
    ) -> Self {
        Self {
            id: None,
            start_time,
            end_time,
            duration: (end_time - start_time).num_seconds().max(0),
            start_latitude: start_location.latitude,
            start_longitude: start_location.longitude,
            end_latitude: end_location.map(|c| c.latitude),
            end_longitude: end_location.map(|c| c.longitude),
            distance,
            created_at: end_time,
        }
    }

    pub fn start_location(&self) -> Coordinate {
        Coordinate::new(self.start_latitude, self.start_longitude)
    }

    pub fn end_location(&self) -> Option<Coordinate> {
        match (self.end_latitude, self.end_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }
}
