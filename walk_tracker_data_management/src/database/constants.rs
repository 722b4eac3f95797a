pub const WALKS_TABLE_NAME: &str = "walks";
pub const ID: &str = "id";
pub const START_TIME: &str = "startTime";
pub const END_TIME: &str = "endTime";
pub const DURATION: &str = "duration";
pub const START_LATITUDE: &str = "startLatitude";
pub const START_LONGITUDE: &str = "startLongitude";
pub const END_LATITUDE: &str = "endLatitude";
pub const END_LONGITUDE: &str = "endLongitude";
pub const DISTANCE: &str = "distance";
pub const CREATED_AT: &str = "createdAt";

pub const ROUTE_POINTS_TABLE_NAME: &str = "route_points";
// ID
pub const WALK_ID: &str = "walkId";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const TIMESTAMP: &str = "timestamp";
pub const ACCURACY: &str = "accuracy";

pub const ROUTE_POINTS_WALK_INDEX: &str = "idx_route_points_walk";
