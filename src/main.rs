use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use simplicity_bridge::{DeviceMessage, Trigger, WeatherBridge};
use simplicity_core::{AppError, Config, ConfigError, LocationSourceKind};
use simplicity_weather::{
    FixedLocation, IpLocation, LocationFix, LocationOptions, LocationService, LocationSource,
    WeatherProvider,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};

mod triggers;

fn location_source(config: &Config) -> Result<Arc<dyn LocationSource>, AppError> {
    let source: Arc<dyn LocationSource> = match config.location.source {
        LocationSourceKind::Fixed => {
            let (Some(lat), Some(lon)) = (config.location.latitude, config.location.longitude)
            else {
                let reason = "fixed location needs coordinates".to_string();
                return Err(ConfigError::Invalid(reason).into());
            };
            Arc::new(FixedLocation(LocationFix::new(lat, lon)))
        }
        LocationSourceKind::Ip => Arc::new(IpLocation::new(&config.location.ip_lookup_url)?),
    };
    Ok(source)
}

fn build_bridge(
    config: &Config,
) -> Result<(Arc<WeatherBridge>, mpsc::Receiver<DeviceMessage>), AppError> {
    let options = LocationOptions::from_millis(
        config.location.timeout_ms,
        config.location.maximum_age_ms,
    );
    let location = LocationService::new(location_source(config)?, options);
    let provider = WeatherProvider::new(&config.weather.base_url, config.weather.api_key.clone())?;

    let (tx, rx) = mpsc::channel(config.device.channel_capacity);
    let bridge = WeatherBridge::new(location, provider, tx, config.device.inbox_size);
    Ok((Arc::new(bridge), rx))
}

async fn run() -> Result<(), AppError> {
    let (config, _) = Config::load_validated()?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let (bridge, mut device_rx) = build_bridge(&config)?;

    // Stand-in for the watch: one JSON object per line on stdout
    let device = tokio::spawn(async move {
        while let Some(message) = device_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("Failed to encode device message: {}", e),
            }
        }
    });

    tracing::info!("Starting ...");
    bridge.on_trigger(Trigger::Ready);

    let ticker = config
        .weather
        .refresh_interval()
        .map(|period: Duration| interval_at(Instant::now() + period, period));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };
    triggers::pump(BufReader::new(tokio::io::stdin()), ticker, shutdown, |trigger| {
        bridge.on_trigger(trigger);
    })
    .await?;

    tracing::info!("Shutting down");
    drop(bridge);
    device.abort();
    Ok(())
}

fn main() -> Result<()> {
    simplicity_core::init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("simplicity-tokio")
        .build()?;

    let result = runtime.block_on(run());
    // A pending stdin read would otherwise hold shutdown open
    runtime.shutdown_timeout(Duration::from_secs(1));

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("{}", e.user_message());
        return Err(e.into());
    }
    Ok(())
}
