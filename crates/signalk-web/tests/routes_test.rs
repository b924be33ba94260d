//! HTTP route tests against a running host and a canned tide service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tower::ServiceExt;

use signalk_core::{ConfigStorage, Delta, FileConfigStorage, PathValue, PluginConfig, SELF_CONTEXT};
use signalk_plugins::{CalcError, ServerApi, Trigger};
use signalk_providers::{tides_plugin, Fetcher, TideProviders, Url, PLUGIN_ID};
use signalk_server::{ServerConfig, ServerHandle, SignalKServer};
use signalk_web::{create_router, ServerState};

/// Serves the station list and a fixed set of predictions.
#[derive(Default)]
struct CannedTides {
    requests: Mutex<Vec<Url>>,
    fail_predictions: bool,
}

impl Fetcher for CannedTides {
    fn get_json(&self, url: Url) -> BoxFuture<'static, Result<Value, CalcError>> {
        self.requests.lock().unwrap().push(url.clone());
        let body = if url.path().ends_with("stations.json") {
            json!({
                "stations": [
                    {"id": "8443970", "name": "Boston", "lat": 42.3539, "lng": -71.0503, "reference_id": "8443970"},
                    {"id": "8518750", "name": "The Battery", "lat": 40.7006, "lng": -74.0142, "reference_id": "8518750"}
                ]
            })
        } else if self.fail_predictions {
            json!({"error": {"message": "No Predictions data was found."}})
        } else {
            json!({
                "predictions": [
                    {"t": "2024-03-10 19:52", "v": "0.034", "type": "L"},
                    {"t": "2024-03-11 02:05", "v": "2.990", "type": "H"}
                ]
            })
        };
        futures::future::ready(Ok(body)).boxed()
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    handle: ServerHandle,
    storage: Arc<FileConfigStorage>,
    app: Router,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn new(fetcher: CannedTides) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileConfigStorage::new(dir.path()));

        let server = SignalKServer::new(ServerConfig {
            self_urn: "vessels.urn:mrn:signalk:uuid:test-vessel".to_string(),
            config_path: dir.path().to_path_buf(),
            ..Default::default()
        });
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        let api: Arc<dyn ServerApi> = Arc::new(handle.clone());
        let providers = TideProviders::new(api.clone(), Arc::new(fetcher));
        let plugin = tides_plugin(api, &providers, Trigger::Reactive);

        let state = ServerState::new(
            handle.clone(),
            storage.clone(),
            plugin,
            Some(providers.noaa.clone()),
        );
        let app = create_router(Arc::new(state));

        Self {
            _dir: dir,
            handle,
            storage,
            app,
            task,
        }
    }

    async fn publish(&self, values: Vec<PathValue>) {
        let mut deltas = self.handle.subscribe_deltas();
        self.handle
            .handle_message("test", Delta::with_values(SELF_CONTEXT, values));
        timeout(Duration::from_secs(5), deltas.recv())
            .await
            .expect("delta should be applied")
            .expect("delta channel open");
    }

    async fn at_boston(&self) {
        self.publish(vec![
            PathValue::new(
                "navigation.position",
                json!({"latitude": 42.36, "longitude": -71.05}),
            ),
            PathValue::new("navigation.datetime", json!("2024-03-11T06:00:00.000Z")),
        ])
        .await;
    }

    async fn request(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        self.request(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_discovery() {
    let h = Harness::new(CannedTides::default());

    let (status, body) = h.get("/signalk").await;
    assert_eq!(status, StatusCode::OK);
    let doc = as_json(&body);
    assert_eq!(doc["endpoints"]["v1"]["signalk-http"], "/signalk/v1/api");
    assert_eq!(doc["endpoints"]["v1"]["version"], "1.7.0");
}

#[tokio::test]
async fn test_data_model_paths() {
    let h = Harness::new(CannedTides::default());
    h.at_boston().await;

    let (status, body) = h.get("/signalk/v1/api/vessels/self/navigation/position").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["value"]["latitude"], 42.36);

    let (status, _) = h.get("/signalk/v1/api/vessels/self/navigation/speedOverGround").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.get("/signalk/v1/api").await;
    assert_eq!(status, StatusCode::OK);
    assert!(as_json(&body)["vessels"]["urn:mrn:signalk:uuid:test-vessel"].is_object());
}

#[tokio::test]
async fn test_closest_requires_position() {
    let h = Harness::new(CannedTides::default());

    let (status, body) = h.get("/signalk/v1/api/resources/tides/closest").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, b"no position");
}

#[tokio::test]
async fn test_closest_returns_heights_by_day() {
    let h = Harness::new(CannedTides::default());
    h.at_boston().await;

    let (status, body) = h.get("/signalk/v1/api/resources/tides/closest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        as_json(&body),
        json!({
            "name": "Boston",
            "id": "8443970",
            "position": {"latitude": 42.3539, "longitude": -71.0503},
            "date": {
                "20240310": {"height": {"values": [
                    {"value": 0.034, "time": "2024-03-10T19:52:00.000Z"}
                ]}},
                "20240311": {"height": {"values": [
                    {"value": 2.99, "time": "2024-03-11T02:05:00.000Z"}
                ]}}
            }
        })
    );

    // The station list was downloaded and cached next to the settings.
    assert!(h.storage.config_path().join("noaastations.json").exists());
}

#[tokio::test]
async fn test_closest_reports_provider_message() {
    let h = Harness::new(CannedTides {
        fail_predictions: true,
        ..Default::default()
    });
    h.at_boston().await;

    let (status, body) = h.get("/signalk/v1/api/resources/tides/closest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"No Predictions data was found.");
}

#[tokio::test]
async fn test_plugin_list_before_configuration() {
    let h = Harness::new(CannedTides::default());

    let (status, body) = h.get("/skServer/plugins").await;
    assert_eq!(status, StatusCode::OK);
    let plugins = as_json(&body);
    assert_eq!(plugins[0]["id"], PLUGIN_ID);
    assert_eq!(plugins[0]["name"], "Tide APIs");
    assert_eq!(plugins[0]["enabled"], false);
    assert!(plugins[0].get("statusMessage").is_none());
}

#[tokio::test]
async fn test_plugin_schema() {
    let h = Harness::new(CannedTides::default());

    let (status, body) = h.get("/skServer/plugins/tides-api/schema").await;
    assert_eq!(status, StatusCode::OK);
    let doc = as_json(&body);
    assert_eq!(doc["schema"]["title"], "Tides API");
    assert!(doc["schema"]["properties"]["tides"]["properties"]["noaa"].is_object());
    assert!(doc["uiSchema"].is_object());

    let (status, _) = h.get("/skServer/plugins/other/schema").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saving_config_restarts_plugin() {
    let h = Harness::new(CannedTides::default());
    let configuration = json!({"default_ttl": 0, "tides": {"noaa": true}});

    let (status, body) = h
        .post_json(
            "/skServer/plugins/tides-api/config",
            json!({"enabled": true, "configuration": configuration}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Saved configuration for plugin tides-api");

    assert_eq!(
        h.storage.load_plugin_config(PLUGIN_ID).unwrap(),
        PluginConfig {
            enabled: true,
            configuration: configuration.clone(),
        }
    );

    let (_, body) = h.get("/skServer/plugins").await;
    let plugins = as_json(&body);
    assert_eq!(plugins[0]["enabled"], true);
    assert_eq!(plugins[0]["statusMessage"], "Started 1 calculation(s)");
    assert_eq!(plugins[0]["data"], configuration);

    let (status, _) = h
        .post_json(
            "/skServer/plugins/other/config",
            json!({"enabled": true, "configuration": {}}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
