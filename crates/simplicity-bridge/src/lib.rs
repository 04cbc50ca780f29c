//! Relays weather for the watch's position back to the watch.
//!
//! One trigger runs one location + weather pipeline; triggers that arrive
//! while a pipeline is running are dropped.

pub mod bridge;
pub mod error;
pub mod message;
pub mod state;

pub use bridge::{Trigger, TriggerOutcome, WeatherBridge};
pub use error::BridgeError;
pub use message::DeviceMessage;
pub use state::BridgeState;
