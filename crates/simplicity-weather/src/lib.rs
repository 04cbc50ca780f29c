//! Weather side of the Simplicity bridge
//!
//! Provides position fixes from a pluggable location source and current
//! conditions from an OpenWeatherMap-compatible API, converted for display.

pub mod types;
pub mod ip_lookup;
pub mod location;
pub mod provider;

pub use types::*;
pub use ip_lookup::IpLocation;
pub use location::{FixedLocation, LocationOptions, LocationService, LocationSource};
pub use provider::WeatherProvider;
