use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use walk_tracker_lib::{coordinate::Coordinate, distance::route_length, route_point::RoutePoint, walk::Walk};

use crate::{clock::Clock, location::{LocationConfig, LocationProvider, SubscriptionHandle}, recorder::WalkRecorder, SessionError};

/// Placeholder until the recorder has assigned the walk an id.
const UNSAVED_WALK_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    Active,
}

/// Read-only view of the session for presentation code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub start_location: Option<Coordinate>,
    pub current_location: Option<Coordinate>,
    pub route_points: Vec<Coordinate>,
}

impl SessionSnapshot {
    fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            started_at: None,
            start_location: None,
            current_location: None,
            route_points: Vec::new(),
        }
    }
}

struct ActiveWalk {
    started_at: DateTime<Utc>,
    start_location: Coordinate,
    current_location: Coordinate,
    // Never empty, the start fix is element 0
    route_points: Vec<Coordinate>,
}

impl ActiveWalk {
    fn begin(started_at: DateTime<Utc>, fix: Coordinate) -> Self {
        Self {
            started_at,
            start_location: fix,
            current_location: fix,
            route_points: vec![fix],
        }
    }

    fn record(&mut self, sample: Coordinate) {
        self.current_location = sample;
        self.route_points.push(sample);
    }

    /// Per-sample delivery times are not kept, so route point timestamps assume one sample per `cadence`.
    fn finish(self, end_time: DateTime<Utc>, end_location: Option<Coordinate>, cadence: Duration) -> (Walk, Vec<RoutePoint>) {
        let distance = route_length(&self.route_points);
        let walk = Walk::new(self.started_at, end_time, self.start_location, end_location, Some(distance));

        // Offsets that do not fit a timestamp collapse onto the start time
        let cadence = chrono::Duration::from_std(cadence).ok();
        let points = self.route_points.iter()
            .enumerate()
            .map(|(index, coordinate)| {
                let timestamp = cadence
                    .zip(i32::try_from(index).ok())
                    .and_then(|(step, index)| step.checked_mul(index))
                    .and_then(|offset| self.started_at.checked_add_signed(offset))
                    .unwrap_or(self.started_at);
                RoutePoint::new(UNSAVED_WALK_ID, *coordinate, timestamp)
            })
            .collect();

        (walk, points)
    }
}

struct ActiveSubscription {
    handle: SubscriptionHandle,
    samples: mpsc::UnboundedReceiver<Coordinate>,
}

/// Tracks one walk at a time.
///
/// Constructed once and handed to whoever drives it. Location samples arrive over a channel and are
/// applied by `process_pending_samples` or `next_sample`, one sample per state transition.
pub struct WalkSession {
    location: Arc<dyn LocationProvider>,
    recorder: Arc<dyn WalkRecorder>,
    clock: Arc<dyn Clock>,
    config: LocationConfig,
    active: Option<ActiveWalk>,
    subscription: Option<ActiveSubscription>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl WalkSession {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        recorder: Arc<dyn WalkRecorder>,
        clock: Arc<dyn Clock>,
        config: LocationConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::idle());

        Self {
            location,
            recorder,
            clock,
            config,
            active: None,
            subscription: None,
            snapshots,
        }
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        if self.active.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.active {
            Some(active) => SessionSnapshot {
                status: SessionStatus::Active,
                started_at: Some(active.started_at),
                start_location: Some(active.start_location),
                current_location: Some(active.current_location),
                route_points: active.route_points.clone(),
            },
            None => SessionSnapshot::idle(),
        }
    }

    /// A receiver that sees a fresh snapshot after every state change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.active.as_ref().map(|active| self.clock.now() - active.started_at)
    }

    pub fn distance_so_far(&self) -> f64 {
        self.active.as_ref().map(|active| route_length(&active.route_points)).unwrap_or(0.)
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Needs a location fix. Without one the session stays idle.
    pub async fn start(&mut self) -> Result<SessionSnapshot, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let fix = self.location.current_fix().await.map_err(|err| {
            tracing::warn!("Not starting walk, no location fix: {err}");
            SessionError::LocationUnavailable(err)
        })?;

        let (sender, samples) = mpsc::unbounded_channel();
        let handle = self.location.subscribe(&self.config, sender).map_err(|err| {
            tracing::warn!("Not starting walk, location updates unavailable: {err}");
            SessionError::LocationUnavailable(err)
        })?;

        self.subscription = Some(ActiveSubscription { handle, samples });
        self.active = Some(ActiveWalk::begin(self.clock.now(), fix));
        self.publish();

        tracing::info!("Walk started at {:.6}, {:.6}", fix.latitude, fix.longitude);
        Ok(self.snapshot())
    }

    /// Applies every sample already delivered, in order. Returns how many were applied.
    pub fn process_pending_samples(&mut self) -> usize {
        let (Some(subscription), Some(active)) = (self.subscription.as_mut(), self.active.as_mut()) else {
            return 0;
        };

        let mut applied = 0;
        while let Ok(sample) = subscription.samples.try_recv() {
            active.record(sample);
            applied += 1;
        }

        if applied > 0 {
            self.publish();
        }
        applied
    }

    /// Waits for the next sample and applies it. `None` when there is no walk or the provider hung up.
    /// Cancel safe, so it can sit in a `select!` next to the UI's own events.
    pub async fn next_sample(&mut self) -> Option<Coordinate> {
        let sample = self.subscription.as_mut()?.samples.recv().await?;
        let active = self.active.as_mut()?;
        active.record(sample);
        self.publish();
        Some(sample)
    }

    /// Ends the walk and hands it to the recorder. The session is idle afterwards whatever happens to the save.
    pub async fn stop(&mut self) -> Result<Walk, SessionError> {
        if self.active.is_none() {
            return Err(SessionError::NotActive);
        }

        self.process_pending_samples();
        let Some(active) = self.active.take() else {
            return Err(SessionError::NotActive);
        };
        self.unsubscribe();
        self.publish();

        let end_location = match self.location.current_fix().await {
            Ok(fix) => Some(fix),
            Err(err) => {
                tracing::warn!("No end fix, saving walk without end position: {err}");
                None
            }
        };

        let (walk, points) = active.finish(self.clock.now(), end_location, self.config.min_interval);
        tracing::info!("Walk stopped after {}s, {:.1}m over {} points", walk.duration, walk.distance.unwrap_or(0.), points.len());

        self.recorder.record_walk(walk, points).await.map_err(|err| {
            tracing::error!("Failed to save walk: {err}");
            SessionError::PersistenceFailed(err)
        })
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.location.unsubscribe(subscription.handle);
            tracing::debug!("Location updates stopped ({:?})", subscription.handle);
        }
    }
}

impl Drop for WalkSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            tracing::warn!("Walk session dropped with a walk in progress");
        }
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use walk_tracker_data_management::{StoreConfig, WalkStore, WalkStoreError};
    use walk_tracker_lib::distance::haversine_distance;

    use crate::{clock::ManualClock, location::SimulatedLocationProvider, LocationError};

    use super::*;

    struct FailingRecorder;

    #[async_trait::async_trait]
    impl WalkRecorder for FailingRecorder {
        async fn record_walk(&self, _walk: Walk, _points: Vec<RoutePoint>) -> Result<Walk, WalkStoreError> {
            Err(WalkStoreError::WriteFailed("disk full".into()))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 14, 17, 0, 0).unwrap()
    }

    struct Harness {
        location: Arc<SimulatedLocationProvider>,
        clock: Arc<ManualClock>,
        store: Arc<WalkStore>,
        session: WalkSession,
    }

    async fn harness(start: Coordinate) -> Harness {
        let location = Arc::new(SimulatedLocationProvider::with_fix(start));
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(WalkStore::open(StoreConfig::InMemory).await.unwrap());
        let session = WalkSession::new(location.clone(), store.clone(), clock.clone(), LocationConfig::default());

        Harness { location, clock, store, session }
    }

    fn failing_session(location: Arc<SimulatedLocationProvider>) -> WalkSession {
        WalkSession::new(location, Arc::new(FailingRecorder), Arc::new(ManualClock::new(t0())), LocationConfig::default())
    }

    #[tokio::test]
    async fn start_without_fix_stays_idle() {
        let location = Arc::new(SimulatedLocationProvider::new());
        let mut session = failing_session(location.clone());

        let result = session.start().await;

        assert!(matches!(result, Err(SessionError::LocationUnavailable(LocationError::NoFix))));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.snapshot().route_points.is_empty());
        assert_eq!(session.snapshot().started_at, None);
        assert_eq!(location.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn start_rolls_back_when_updates_are_refused() {
        let location = Arc::new(SimulatedLocationProvider::with_fix(Coordinate::new(1., 2.)));
        location.refuse_subscriptions(true);
        let mut session = failing_session(location.clone());

        let result = session.start().await;

        assert!(matches!(result, Err(SessionError::LocationUnavailable(LocationError::PermissionDenied))));
        assert_eq!(session.snapshot(), SessionSnapshot::idle());
    }

    #[tokio::test]
    async fn start_seeds_route_with_fix() {
        let fix = Coordinate::new(40.0, -74.0);
        let mut h = harness(fix).await;

        let snapshot = h.session.start().await.unwrap();

        assert_eq!(snapshot.status, SessionStatus::Active);
        assert_eq!(snapshot.route_points, vec![fix]);
        assert_eq!(snapshot.start_location, Some(fix));
        assert_eq!(snapshot.current_location, Some(fix));
        assert_eq!(snapshot.started_at, Some(t0()));
        assert_eq!(h.location.active_subscriptions(), 1);
        assert_eq!(h.location.last_config(), Some(LocationConfig {
            high_accuracy: true,
            min_interval: Duration::from_secs(5),
            min_distance_meters: 10.,
        }));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut h = harness(Coordinate::new(1., 1.)).await;
        h.session.start().await.unwrap();

        assert!(matches!(h.session.start().await, Err(SessionError::AlreadyActive)));
        assert_eq!(h.location.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_rejected() {
        let mut h = harness(Coordinate::new(1., 1.)).await;

        assert!(matches!(h.session.stop().await, Err(SessionError::NotActive)));
        assert_eq!(h.store.get_walk_stats().await.unwrap().total_walks, 0);
    }

    #[tokio::test]
    async fn samples_are_applied_in_order() {
        let mut h = harness(Coordinate::new(0., 0.)).await;
        h.session.start().await.unwrap();

        let samples = [Coordinate::new(0., 0.001), Coordinate::new(0., 0.002), Coordinate::new(0.001, 0.002)];
        for sample in samples {
            h.location.push_sample(sample);
        }

        assert_eq!(h.session.process_pending_samples(), 3);

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.route_points, vec![Coordinate::new(0., 0.), samples[0], samples[1], samples[2]]);
        assert_eq!(snapshot.current_location, Some(samples[2]));
        assert_eq!(snapshot.start_location, Some(Coordinate::new(0., 0.)));
        assert_eq!(h.session.process_pending_samples(), 0);
    }

    #[tokio::test]
    async fn next_sample_waits_for_delivery() {
        let mut h = harness(Coordinate::new(0., 0.)).await;
        h.session.start().await.unwrap();
        h.location.push_sample(Coordinate::new(0., 0.01));

        assert_eq!(h.session.next_sample().await, Some(Coordinate::new(0., 0.01)));
        assert_eq!(h.session.snapshot().route_points.len(), 2);
        assert!(h.session.distance_so_far() > 1000.);
    }

    #[tokio::test]
    async fn next_sample_while_idle_returns_none() {
        let mut h = harness(Coordinate::new(0., 0.)).await;
        assert_eq!(h.session.next_sample().await, None);
    }

    #[tokio::test]
    async fn watchers_see_every_change() {
        let mut h = harness(Coordinate::new(0., 0.)).await;
        let mut watcher = h.session.watch();
        assert_eq!(watcher.borrow_and_update().status, SessionStatus::Idle);

        h.session.start().await.unwrap();
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().status, SessionStatus::Active);

        h.location.push_sample(Coordinate::new(0., 0.001));
        h.session.process_pending_samples();
        assert_eq!(watcher.borrow_and_update().route_points.len(), 2);

        h.session.stop().await.unwrap();
        assert_eq!(*watcher.borrow_and_update(), SessionSnapshot::idle());
    }

    #[tokio::test]
    async fn elapsed_follows_clock() {
        let mut h = harness(Coordinate::new(0., 0.)).await;
        assert_eq!(h.session.elapsed(), None);

        h.session.start().await.unwrap();
        h.clock.advance(chrono::Duration::seconds(42));

        assert_eq!(h.session.elapsed(), Some(chrono::Duration::seconds(42)));
    }

    #[tokio::test]
    async fn failed_save_still_resets() {
        let location = Arc::new(SimulatedLocationProvider::with_fix(Coordinate::new(10., 10.)));
        let mut session = failing_session(location.clone());
        session.start().await.unwrap();
        location.push_sample(Coordinate::new(10.001, 10.));

        let result = session.stop().await;

        assert!(matches!(result, Err(SessionError::PersistenceFailed(WalkStoreError::WriteFailed(_)))));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.snapshot().route_points.is_empty());
        assert_eq!(session.snapshot().started_at, None);
        assert_eq!(location.active_subscriptions(), 0);
        assert_eq!(location.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn missing_end_fix_still_saves() {
        let mut h = harness(Coordinate::new(55.0, 12.0)).await;
        h.session.start().await.unwrap();
        h.location.fail_next_fix();

        let walk = h.session.stop().await.unwrap();

        assert_eq!(walk.end_latitude, None);
        assert_eq!(walk.end_longitude, None);
        let stored = h.store.get_walk_by_id(walk.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.end_location(), None);
        assert_eq!(stored.distance, Some(0.));
    }

    #[tokio::test]
    async fn session_can_walk_again_after_stop() {
        let mut h = harness(Coordinate::new(1., 1.)).await;
        h.session.start().await.unwrap();
        h.session.stop().await.unwrap();

        h.session.start().await.unwrap();
        h.session.stop().await.unwrap();

        assert_eq!(h.store.get_all_walks().await.unwrap().len(), 2);
        assert_eq!(h.location.unsubscribe_calls(), 2);
    }

    #[tokio::test]
    async fn dropping_active_session_unsubscribes() {
        let h = harness(Coordinate::new(1., 1.)).await;
        let location = h.location.clone();
        let mut session = h.session;
        session.start().await.unwrap();
        assert_eq!(location.active_subscriptions(), 1);

        drop(session);

        assert_eq!(location.active_subscriptions(), 0);
        assert_eq!(location.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn dropping_idle_session_does_not_unsubscribe() {
        let h = harness(Coordinate::new(1., 1.)).await;
        let location = h.location.clone();
        drop(h);

        assert_eq!(location.unsubscribe_calls(), 0);
    }

    #[tokio::test]
    async fn triangle_walk_end_to_end() {
        let a = Coordinate::new(40.0, -74.0);
        let b = Coordinate::new(40.0009, -74.0);
        let c = Coordinate::new(40.0009, -73.99883);
        let mut h = harness(a).await;

        h.session.start().await.unwrap();
        for sample in [b, c, a] {
            h.clock.advance(chrono::Duration::seconds(5));
            h.location.push_sample(sample);
        }
        let walk = h.session.stop().await.unwrap();

        // Legs of roughly 100 m each
        let north = haversine_distance(&a, &b);
        let east = haversine_distance(&b, &c);
        assert!((99. ..101.).contains(&north), "north leg {north}");
        assert!((99. ..101.).contains(&east), "east leg {east}");

        let expected = north + east + haversine_distance(&c, &a);
        let walk_id = walk.id.unwrap();
        let stored = h.store.get_walk_by_id(walk_id).await.unwrap().unwrap();
        assert!((stored.distance.unwrap() - expected).abs() < 1e-6);
        assert_eq!(stored.duration, 15);
        assert_eq!(stored.start_location(), a);
        assert_eq!(stored.end_location(), Some(a));
        assert_eq!(stored.start_time, t0());
        assert_eq!(stored.end_time, t0() + chrono::Duration::seconds(15));

        assert_eq!(h.session.snapshot(), SessionSnapshot::idle());
        assert_eq!(h.location.active_subscriptions(), 0);

        let route = h.store.get_route_points(walk_id).await.unwrap();
        let coordinates: Vec<_> = route.iter().map(|p| p.coordinate()).collect();
        assert_eq!(coordinates, vec![a, b, c, a]);
    }

    #[tokio::test]
    async fn route_timestamps_assume_fixed_cadence() {
        // Samples arrive 3 s and 20 s apart, but stored timestamps still step by the 5 s interval.
        let mut h = harness(Coordinate::new(0., 0.)).await;
        h.session.start().await.unwrap();
        h.clock.advance(chrono::Duration::seconds(3));
        h.location.push_sample(Coordinate::new(0., 0.001));
        h.clock.advance(chrono::Duration::seconds(20));
        h.location.push_sample(Coordinate::new(0., 0.002));

        let walk = h.session.stop().await.unwrap();
        let route = h.store.get_route_points(walk.id.unwrap()).await.unwrap();

        let offsets: Vec<_> = route.iter().map(|p| (p.timestamp - t0()).num_seconds()).collect();
        assert_eq!(offsets, vec![0, 5, 10]);
        assert_eq!(walk.duration, 23);
    }

    #[tokio::test]
    async fn oversized_cadence_falls_back_to_start_time() {
        let location = Arc::new(SimulatedLocationProvider::with_fix(Coordinate::new(0., 0.)));
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(WalkStore::open(StoreConfig::InMemory).await.unwrap());
        let config = LocationConfig { min_interval: Duration::from_secs(u64::MAX), ..LocationConfig::default() };
        let mut session = WalkSession::new(location.clone(), store.clone(), clock.clone(), config);

        session.start().await.unwrap();
        location.push_sample(Coordinate::new(0., 0.001));
        location.push_sample(Coordinate::new(0., 0.002));
        clock.advance(chrono::Duration::seconds(30));

        let walk = session.stop().await.unwrap();
        let route = store.get_route_points(walk.id.unwrap()).await.unwrap();

        assert_eq!(route.len(), 3);
        assert!(route.iter().all(|p| p.timestamp == t0()));
        assert_eq!(walk.duration, 30);
    }

    #[tokio::test]
    async fn pending_samples_ignored_while_idle() {
        let mut h = harness(Coordinate::new(1., 1.)).await;

        assert_eq!(h.session.process_pending_samples(), 0);
        h.location.push_sample(Coordinate::new(1., 1.001));
        assert_eq!(h.session.process_pending_samples(), 0);
        assert_eq!(h.session.snapshot(), SessionSnapshot::idle());
    }
}
