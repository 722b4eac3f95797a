pub mod coordinate;
pub mod distance;
pub mod route_point;
pub mod walk;
pub mod walk_stats;
