use serde::{Deserialize, Serialize};

/// Aggregates over every stored walk. All zero when there are no walks.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow), sqlx(rename_all = "camelCase"))]
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalkStats {
    pub total_walks: i64,
    /// Seconds
    pub total_duration: i64,
    /// Meters
    pub total_distance: f64,
    /// Seconds
    pub average_duration: f64,
}
