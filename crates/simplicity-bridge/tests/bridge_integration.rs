//! End-to-end tests for WeatherBridge against a mock weather API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use simplicity_bridge::{BridgeState, DeviceMessage, Trigger, TriggerOutcome, WeatherBridge};
use simplicity_weather::{
    FixedLocation, LocationError, LocationFix, LocationOptions, LocationService, LocationSource,
    WeatherProvider,
};
use tokio::sync::{mpsc, Notify};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Location source that answers only once released.
struct GatedSource {
    calls: AtomicUsize,
    gate: Notify,
    result: Result<LocationFix, LocationError>,
}

impl GatedSource {
    fn new(result: Result<LocationFix, LocationError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
            result,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl LocationSource for GatedSource {
    async fn current_position(&self) -> Result<LocationFix, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        self.result.clone()
    }
}

/// Location source that answers immediately with a fixed result.
struct ScriptedSource {
    calls: AtomicUsize,
    result: Result<LocationFix, LocationError>,
}

#[async_trait]
impl LocationSource for ScriptedSource {
    async fn current_position(&self) -> Result<LocationFix, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn san_francisco() -> LocationFix {
    LocationFix::new(37.77, -122.42)
}

fn san_francisco_body() -> serde_json::Value {
    serde_json::json!({
        "main": { "temp": 290 },
        "name": "San Francisco",
        "sys": { "country": "US" }
    })
}

// maximum_age of zero so each trigger consults the source again
fn no_cache() -> LocationOptions {
    LocationOptions::from_millis(15_000, 0)
}

fn make_bridge(
    source: Arc<dyn LocationSource>,
    options: LocationOptions,
    base_url: &str,
) -> (Arc<WeatherBridge>, mpsc::Receiver<DeviceMessage>) {
    let location = LocationService::new(source, options);
    let provider = WeatherProvider::new(base_url, None).unwrap();
    let (tx, rx) = mpsc::channel(8);
    (Arc::new(WeatherBridge::new(location, provider, tx, 64)), rx)
}

async fn mount_weather(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn wait_for_state(bridge: &WeatherBridge, wanted: BridgeState) {
    for _ in 0..200 {
        if bridge.state() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("bridge never reached {wanted:?}, stuck in {:?}", bridge.state());
}

#[tokio::test]
async fn test_success_relays_city_and_temperature() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "37.77"))
        .and(query_param("lon", "-122.42"))
        .and(query_param("cnt", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(san_francisco_body()))
        .mount(&server)
        .await;

    let (bridge, mut rx) = make_bridge(
        Arc::new(FixedLocation(san_francisco())),
        LocationOptions::default(),
        &server.uri(),
    );

    let message = bridge.run_trigger(Trigger::Ready).await.unwrap();
    let expected = DeviceMessage::Weather {
        city: "San Francisco".into(),
        temperature: 62,
    };
    assert_eq!(message, expected);
    assert_eq!(rx.recv().await.unwrap(), expected);
    assert_eq!(bridge.state(), BridgeState::Idle);

    assert!(bridge.run_trigger(Trigger::AppMessage).await.is_some());
}

#[tokio::test]
async fn test_celsius_outside_us() {
    let server = MockServer::start().await;
    mount_weather(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "main": { "temp": 300.15 },
            "name": "Berlin",
            "sys": { "country": "DE" }
        })),
    )
    .await;

    let (bridge, _rx) = make_bridge(
        Arc::new(FixedLocation(LocationFix::new(52.52, 13.40))),
        LocationOptions::default(),
        &server.uri(),
    );

    let message = bridge.run_trigger(Trigger::Ready).await.unwrap();
    assert_eq!(
        message,
        DeviceMessage::Weather {
            city: "Berlin".into(),
            temperature: 27
        }
    );
}

#[tokio::test]
async fn test_location_failure_reports_and_releases() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(san_francisco_body()))
        .expect(0)
        .mount(&server)
        .await;

    let source = Arc::new(ScriptedSource {
        calls: AtomicUsize::new(0),
        result: Err(LocationError::PositionUnavailable("Position unavailable".into())),
    });
    let (bridge, mut rx) = make_bridge(source.clone(), no_cache(), &server.uri());

    let message = bridge.run_trigger(Trigger::Ready).await.unwrap();
    assert_eq!(message, DeviceMessage::error("Loc unavailable"));
    assert_eq!(rx.recv().await.unwrap(), DeviceMessage::error("Loc unavailable"));
    assert_eq!(bridge.state(), BridgeState::Idle);

    // Next trigger is accepted straight away
    assert!(bridge.run_trigger(Trigger::AppMessage).await.is_some());
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_location_timeout_reports_and_releases() {
    let server = MockServer::start().await;
    let source = GatedSource::new(Ok(san_francisco()));
    let (bridge, _rx) = make_bridge(
        source.clone(),
        LocationOptions::from_millis(50, 0),
        &server.uri(),
    );

    let message = bridge.run_trigger(Trigger::Ready).await.unwrap();
    assert_eq!(message, DeviceMessage::error("Loc unavailable"));
    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[tokio::test]
async fn test_http_failure_reports_and_releases() {
    let server = MockServer::start().await;
    mount_weather(&server, ResponseTemplate::new(500)).await;

    let (bridge, mut rx) = make_bridge(
        Arc::new(FixedLocation(san_francisco())),
        LocationOptions::default(),
        &server.uri(),
    );

    let message = bridge.run_trigger(Trigger::Ready).await.unwrap();
    assert_eq!(message, DeviceMessage::error("HTTP Error"));
    assert_eq!(rx.recv().await.unwrap(), DeviceMessage::error("HTTP Error"));
    assert_eq!(bridge.state(), BridgeState::Idle);

    assert!(bridge.run_trigger(Trigger::AppMessage).await.is_some());
}

#[tokio::test]
async fn test_malformed_body_reports_and_releases() {
    let server = MockServer::start().await;
    mount_weather(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "Nowhere" })),
    )
    .await;

    let (bridge, _rx) = make_bridge(
        Arc::new(FixedLocation(san_francisco())),
        LocationOptions::default(),
        &server.uri(),
    );

    let message = bridge.run_trigger(Trigger::Ready).await.unwrap();
    assert_eq!(message, DeviceMessage::error("Bad response"));
    assert_eq!(bridge.state(), BridgeState::Idle);
    assert!(bridge.run_trigger(Trigger::AppMessage).await.is_some());
}

#[tokio::test]
async fn test_trigger_dropped_while_locating() {
    let server = MockServer::start().await;
    mount_weather(
        &server,
        ResponseTemplate::new(200).set_body_json(san_francisco_body()),
    )
    .await;

    let source = GatedSource::new(Ok(san_francisco()));
    let (bridge, mut rx) = make_bridge(source.clone(), no_cache(), &server.uri());

    let handle = match bridge.on_trigger(Trigger::Ready) {
        TriggerOutcome::Accepted(handle) => handle,
        TriggerOutcome::Dropped => panic!("first trigger must be accepted"),
    };
    assert_eq!(bridge.state(), BridgeState::Locating);

    assert!(!bridge.on_trigger(Trigger::AppMessage).is_accepted());
    assert!(bridge.run_trigger(Trigger::AppMessage).await.is_none());

    // Let the accepted pipeline reach the source before releasing it
    for _ in 0..200 {
        if source.calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    source.release();

    let message = handle.await.unwrap();
    assert_eq!(
        message,
        DeviceMessage::Weather {
            city: "San Francisco".into(),
            temperature: 62
        }
    );
    assert_eq!(rx.recv().await.unwrap(), message);
    assert!(rx.try_recv().is_err(), "dropped triggers must not emit");

    assert_eq!(source.calls(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[tokio::test]
async fn test_trigger_dropped_while_fetching() {
    let server = MockServer::start().await;
    mount_weather(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(san_francisco_body())
            .set_delay(Duration::from_millis(300)),
    )
    .await;

    let (bridge, _rx) = make_bridge(
        Arc::new(FixedLocation(san_francisco())),
        LocationOptions::default(),
        &server.uri(),
    );

    let handle = match bridge.on_trigger(Trigger::Ready) {
        TriggerOutcome::Accepted(handle) => handle,
        TriggerOutcome::Dropped => panic!("first trigger must be accepted"),
    };
    wait_for_state(&bridge, BridgeState::Fetching).await;

    assert!(!bridge.on_trigger(Trigger::AppMessage).is_accepted());

    assert!(!handle.await.unwrap().is_error());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    assert!(bridge.on_trigger(Trigger::AppMessage).is_accepted());
}

#[tokio::test]
async fn test_aborted_pipeline_releases_bridge() {
    let server = MockServer::start().await;
    let source = GatedSource::new(Ok(san_francisco()));
    let (bridge, mut rx) = make_bridge(source.clone(), no_cache(), &server.uri());

    let handle = match bridge.on_trigger(Trigger::Ready) {
        TriggerOutcome::Accepted(handle) => handle,
        TriggerOutcome::Dropped => panic!("first trigger must be accepted"),
    };
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert_eq!(bridge.state(), BridgeState::Idle);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_every_exit_path_accepts_next_trigger() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_weather(
        &server,
        ResponseTemplate::new(200).set_body_json(san_francisco_body()),
    )
    .await;

    let (bridge, _rx) = make_bridge(
        Arc::new(FixedLocation(san_francisco())),
        LocationOptions::default(),
        &server.uri(),
    );

    assert_eq!(
        bridge.run_trigger(Trigger::Ready).await,
        Some(DeviceMessage::error("HTTP Error"))
    );
    let second = bridge.run_trigger(Trigger::AppMessage).await.unwrap();
    assert!(!second.is_error());
    assert!(bridge.run_trigger(Trigger::AppMessage).await.is_some());
    assert_eq!(bridge.state(), BridgeState::Idle);
}
