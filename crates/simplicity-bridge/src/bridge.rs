//! The trigger → location → weather → message pipeline.

use std::sync::Arc;

use parking_lot::Mutex;
use simplicity_weather::{LocationError, LocationFix, LocationService, WeatherProvider};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::BridgeError;
use crate::message::DeviceMessage;
use crate::state::BridgeState;

/// Inbound events that ask for fresh weather
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Companion app launched
    Ready,
    /// Message received from the watch
    AppMessage,
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// A pipeline was started; the handle resolves to the message sent to the watch.
    Accepted(JoinHandle<DeviceMessage>),
    /// Another pipeline is in flight, nothing was started.
    Dropped,
}

impl TriggerOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TriggerOutcome::Accepted(_))
    }
}

/// Holds the bridge out of `Idle` for the lifetime of one pipeline.
///
/// Dropping it returns the state to `Idle`, so every exit path (including a
/// panicking or aborted task) releases the bridge.
struct InFlightGuard {
    state: Arc<Mutex<BridgeState>>,
}

impl InFlightGuard {
    fn try_acquire(state: &Arc<Mutex<BridgeState>>) -> Option<Self> {
        let mut current = state.lock();
        if !current.can_accept_trigger() {
            return None;
        }
        *current = current.on_trigger_accepted();
        Some(Self {
            state: Arc::clone(state),
        })
    }

    fn location_resolved(&self) {
        let mut current = self.state.lock();
        *current = current.on_location_resolved();
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut current = self.state.lock();
        *current = current.on_finished();
    }
}

pub struct WeatherBridge {
    state: Arc<Mutex<BridgeState>>,
    location: LocationService,
    provider: WeatherProvider,
    outbox: mpsc::Sender<DeviceMessage>,
    inbox_size: usize,
}

impl WeatherBridge {
    /// `inbox_size` is the watch's AppMessage inbox in bytes; weather
    /// messages are shortened to fit it.
    pub fn new(
        location: LocationService,
        provider: WeatherProvider,
        outbox: mpsc::Sender<DeviceMessage>,
        inbox_size: usize,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(BridgeState::Idle)),
            location,
            provider,
            outbox,
            inbox_size,
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    fn begin(&self, trigger: Trigger) -> Option<InFlightGuard> {
        match InFlightGuard::try_acquire(&self.state) {
            Some(guard) => {
                tracing::info!(?trigger, "Starting weather request");
                Some(guard)
            }
            None => {
                tracing::info!(
                    ?trigger,
                    "Not starting a new request. Another one is in progress..."
                );
                None
            }
        }
    }

    /// Start a pipeline in the background unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_trigger(self: &Arc<Self>, trigger: Trigger) -> TriggerOutcome {
        match self.begin(trigger) {
            Some(guard) => {
                let bridge = Arc::clone(self);
                let handle = tokio::spawn(async move { bridge.run_pipeline(guard).await });
                TriggerOutcome::Accepted(handle)
            }
            None => TriggerOutcome::Dropped,
        }
    }

    /// Run a pipeline to completion on the current task.
    ///
    /// Returns the message sent to the watch, or `None` if the trigger was dropped.
    pub async fn run_trigger(&self, trigger: Trigger) -> Option<DeviceMessage> {
        let guard = self.begin(trigger)?;
        Some(self.run_pipeline(guard).await)
    }

    async fn run_pipeline(&self, guard: InFlightGuard) -> DeviceMessage {
        match self.location.get_current_position().await {
            Ok(fix) => self.on_location_resolved(guard, fix).await,
            Err(e) => self.on_location_failed(guard, e).await,
        }
    }

    async fn on_location_resolved(
        &self,
        guard: InFlightGuard,
        fix: LocationFix,
    ) -> DeviceMessage {
        tracing::info!("Got coordinates: {}, {}", fix.latitude, fix.longitude);
        guard.location_resolved();
        self.fetch_weather(guard, fix.latitude, fix.longitude).await
    }

    async fn on_location_failed(
        &self,
        guard: InFlightGuard,
        error: LocationError,
    ) -> DeviceMessage {
        tracing::warn!("Location error ({}): {}", error.code(), error);
        let message = BridgeError::from(error).device_message();
        self.finish(guard, message).await
    }

    async fn fetch_weather(
        &self,
        guard: InFlightGuard,
        latitude: f64,
        longitude: f64,
    ) -> DeviceMessage {
        let message = match self.provider.fetch(latitude, longitude).await {
            Ok(reading) => {
                let temperature = reading.display_temperature();
                tracing::info!("Temperature: {} City: {}", temperature, reading.city);
                DeviceMessage::weather(reading.city, temperature).fit_to(self.inbox_size)
            }
            Err(e) => {
                let error = BridgeError::from(e);
                tracing::warn!("{}", error);
                error.device_message()
            }
        };
        self.finish(guard, message).await
    }

    /// Release the bridge, then hand the message to the watch.
    async fn finish(&self, guard: InFlightGuard, message: DeviceMessage) -> DeviceMessage {
        drop(guard);
        if self.outbox.send(message.clone()).await.is_err() {
            tracing::warn!("Device channel closed, dropping {:?}", message);
        }
        message
    }
}
