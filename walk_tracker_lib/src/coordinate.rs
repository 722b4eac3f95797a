use geo_types::Point;
use serde::{Deserialize, Serialize};

/// A single WGS84 position. Ranges are not enforced, GPS hardware can and will report garbage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// geo-types uses x = longitude, y = latitude
impl From<Coordinate> for Point {
    fn from(coordinate: Coordinate) -> Self {
        Point::new(coordinate.longitude, coordinate.latitude)
    }
}

impl From<Point> for Coordinate {
    fn from(point: Point) -> Self {
        Coordinate::new(point.y(), point.x())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_conversion_swaps_axes() {
        let coordinate = Coordinate::new(55.67, 12.56);
        let point: Point = coordinate.into();

        assert_eq!(point.x(), 12.56);
        assert_eq!(point.y(), 55.67);
        assert_eq!(Coordinate::from(point), coordinate);
    }
}
