use std::{io::Write, path::{Path, PathBuf}, time::SystemTime};

use chrono::{DateTime, Utc};
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use time::OffsetDateTime;
use walk_tracker_lib::{route_point::RoutePoint, walk::Walk};

use crate::{WalkStore, WalkStoreError, GPX_EXPORT_DIR};

impl WalkStore {
    /// Writes the walk and its route as a GPX 1.1 document.
    pub async fn export_gpx<W: Write>(&self, walk_id: i64, writer: W) -> Result<(), WalkStoreError> {
        let gpx = self.load_gpx(walk_id).await?;
        gpx::write(&gpx, writer).map_err(|err| WalkStoreError::Export(err.to_string()))
    }

    /// The target file is only touched once the document is fully serialized.
    pub async fn export_gpx_file(&self, walk_id: i64, path: impl AsRef<Path>) -> Result<(), WalkStoreError> {
        let gpx = self.load_gpx(walk_id).await?;

        let mut buffer = Vec::new();
        gpx::write(&gpx, &mut buffer).map_err(|err| WalkStoreError::Export(err.to_string()))?;

        tokio::fs::write(path.as_ref(), buffer).await?;
        Ok(())
    }

    async fn load_gpx(&self, walk_id: i64) -> Result<Gpx, WalkStoreError> {
        let walk = self.get_walk_by_id(walk_id).await?.ok_or(WalkStoreError::WalkNotFound(walk_id))?;
        let route = self.get_route_points(walk_id).await?;

        tracing::debug!("Exporting walk {walk_id} with {} points", route.len());
        Ok(build_gpx(&walk, &route))
    }
}

/// `data/gpx/walk_<id>.gpx` under the given root.
pub fn default_export_path(root: &Path, walk_id: i64) -> PathBuf {
    root.join(GPX_EXPORT_DIR).join(format!("walk_{walk_id}.gpx"))
}

fn gpx_time(timestamp: DateTime<Utc>) -> Time {
    let time: SystemTime = timestamp.into();
    let time: OffsetDateTime = time.into();
    Time::from(time)
}

fn build_gpx(walk: &Walk, route: &[RoutePoint]) -> Gpx {
    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.creator = Some(env!("CARGO_PKG_NAME").to_string());

    let name = match walk.id {
        Some(id) => format!("Walk {id}"),
        None => "Walk".to_string(),
    };

    gpx.metadata = Some(gpx::Metadata {
        name: Some(name.clone()),
        time: Some(gpx_time(walk.start_time)),
        ..Default::default()
    });

    let mut track = Track::new();
    track.name = Some(name);

    let mut segment = TrackSegment::new();
    route.iter().for_each(|p| {
        let mut wp = Waypoint::new(Point::from(p.coordinate()));
        wp.time = Some(gpx_time(p.timestamp));
        segment.points.push(wp);
    });

    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx
}
