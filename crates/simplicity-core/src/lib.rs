pub mod config;
pub mod error;

pub use config::{
    Config, DeviceConfig, LocationConfig, LocationSourceKind, ValidationResult, WeatherConfig,
};
pub use error::{AppError, ConfigError, NetworkError, ReqwestErrorExt};

/// Initialize logging for the bridge.
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    tracing::info!("Simplicity core initialized");
}
