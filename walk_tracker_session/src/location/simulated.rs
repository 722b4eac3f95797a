use std::{collections::{HashMap, VecDeque}, sync::Mutex};

use tokio::sync::mpsc::UnboundedSender;
use walk_tracker_lib::coordinate::Coordinate;

use super::{LocationConfig, LocationError, LocationProvider, SubscriptionHandle};

#[derive(Default)]
struct SimulatedState {
    current: Option<Coordinate>,
    scripted: VecDeque<Result<Coordinate, LocationError>>,
    subscribers: HashMap<SubscriptionHandle, UnboundedSender<Coordinate>>,
    next_handle: u64,
    refuse_subscriptions: bool,
    unsubscribe_calls: usize,
    last_config: Option<LocationConfig>,
}

/// Scriptable location provider. Fixes come from the script first, then from the current position.
#[derive(Default)]
pub struct SimulatedLocationProvider {
    state: Mutex<SimulatedState>,
}

impl SimulatedLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fix(position: Coordinate) -> Self {
        let provider = Self::new();
        provider.set_current_fix(Some(position));
        provider
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_current_fix(&self, position: Option<Coordinate>) {
        self.state().current = position;
    }

    pub fn queue_fix(&self, fix: Result<Coordinate, LocationError>) {
        self.state().scripted.push_back(fix);
    }

    pub fn fail_next_fix(&self) {
        self.queue_fix(Err(LocationError::NoFix));
    }

    pub fn refuse_subscriptions(&self, refuse: bool) {
        self.state().refuse_subscriptions = refuse;
    }

    /// Moves the device and delivers the sample to every live subscriber. Returns how many received it.
    pub fn push_sample(&self, position: Coordinate) -> usize {
        let mut state = self.state();
        state.current = Some(position);
        state.subscribers.retain(|_, samples| samples.send(position).is_ok());
        state.subscribers.len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state().subscribers.len()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state().unsubscribe_calls
    }

    pub fn last_config(&self) -> Option<LocationConfig> {
        self.state().last_config.clone()
    }
}

#[async_trait::async_trait]
impl LocationProvider for SimulatedLocationProvider {
    async fn current_fix(&self) -> Result<Coordinate, LocationError> {
        let mut state = self.state();
        match state.scripted.pop_front() {
            Some(fix) => fix,
            None => state.current.ok_or(LocationError::NoFix),
        }
    }

    fn subscribe(&self, config: &LocationConfig, samples: UnboundedSender<Coordinate>) -> Result<SubscriptionHandle, LocationError> {
        let mut state = self.state();
        if state.refuse_subscriptions {
            return Err(LocationError::PermissionDenied);
        }

        let handle = SubscriptionHandle(state.next_handle);
        state.next_handle += 1;
        state.subscribers.insert(handle, samples);
        state.last_config = Some(config.clone());
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut state = self.state();
        state.unsubscribe_calls += 1;
        if state.subscribers.remove(&handle).is_none() {
            tracing::debug!("Ignoring unsubscribe for unknown {handle:?}");
        }
    }
}
