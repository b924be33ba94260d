//! In-memory host and calculation doubles shared by the unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::FutureExt;
use futures::stream::StreamExt;
use serde_json::{Map, Value};
use signalk_core::{Delta, PathValue};
use tokio::sync::broadcast;

use crate::api::{ChangeFeed, ServerApi};
use crate::calculation::{CalcFuture, CalcOutput, Calculation, DEFAULT_DEBOUNCE};
use crate::error::CalcError;

/// Host double: values and feeds per path, records everything sent back.
#[derive(Default)]
pub struct FakeApi {
    values: Mutex<HashMap<String, Value>>,
    feeds: Mutex<HashMap<String, broadcast::Sender<Value>>>,
    sent: Mutex<Vec<(String, Delta)>>,
    errors: Mutex<Vec<String>>,
    statuses: Mutex<Vec<String>>,
}

impl FakeApi {
    pub const CONTEXT: &'static str = "vessels.urn:mrn:signalk:uuid:test";

    fn sender(&self, path: &str) -> broadcast::Sender<Value> {
        self.feeds
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    /// Set the current value without notifying subscribers.
    pub fn set(&self, path: &str, value: Value) {
        self.values.lock().unwrap().insert(path.to_string(), value);
    }

    /// Set the current value and push it to subscribers.
    pub fn publish(&self, path: &str, value: Value) {
        self.set(path, value.clone());
        let _ = self.sender(path).send(value);
    }

    pub fn sent(&self) -> Vec<(String, Delta)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ServerApi for FakeApi {
    fn self_context(&self) -> String {
        Self::CONTEXT.to_string()
    }

    fn get_self_path(&self, path: &str) -> Option<Value> {
        self.values.lock().unwrap().get(path).cloned()
    }

    fn self_stream(&self, path: &str) -> ChangeFeed {
        let rx = self.sender(path).subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.ok().map(|value| (value, rx))
        })
        .boxed()
    }

    fn handle_message(&self, plugin_id: &str, delta: Delta) {
        self.sent
            .lock()
            .unwrap()
            .push((plugin_id.to_string(), delta));
    }

    fn set_provider_error(&self, _plugin_id: &str, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn set_provider_status(&self, _plugin_id: &str, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn config_path(&self) -> PathBuf {
        std::env::temp_dir()
    }
}

type Responder = fn(&[Value]) -> Option<CalcFuture>;

/// Calculation double recording every input tuple it is called with.
#[derive(Clone)]
pub struct TestCalc {
    group: Option<String>,
    key: String,
    paths: Vec<String>,
    delay: Duration,
    ttl: Option<f64>,
    defaults: Vec<Option<Value>>,
    properties: Option<Map<String, Value>>,
    respond: Responder,
    seen: Arc<Mutex<Vec<Vec<Value>>>>,
    started_with: Arc<Mutex<Option<Value>>>,
    stopped: Arc<Mutex<bool>>,
}

impl TestCalc {
    pub fn new(paths: &[&str]) -> Self {
        Self {
            group: None,
            key: "test".to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            delay: DEFAULT_DEBOUNCE,
            ttl: None,
            defaults: Vec::new(),
            properties: None,
            respond: TestCalc::echo,
            seen: Arc::new(Mutex::new(Vec::new())),
            started_with: Arc::new(Mutex::new(None)),
            stopped: Arc::new(Mutex::new(false)),
        }
    }

    pub fn keyed(mut self, group: Option<&str>, key: &str) -> Self {
        self.group = group.map(str::to_string);
        self.key = key.to_string();
        self
    }

    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_defaults(mut self, defaults: Vec<Option<Value>>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties.as_object().cloned();
        self
    }

    pub fn responding(mut self, respond: Responder) -> Self {
        self.respond = respond;
        self
    }

    pub fn shared(&self) -> Arc<dyn Calculation> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<Vec<Value>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn started_with(&self) -> Option<Value> {
        self.started_with.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }

    pub fn resolve(result: Result<Option<CalcOutput>, CalcError>) -> Option<CalcFuture> {
        Some(async move { result }.boxed())
    }

    /// Publish the first input back under "test.echo".
    pub fn echo(inputs: &[Value]) -> Option<CalcFuture> {
        Self::resolve(Ok(Some(CalcOutput::Values(vec![PathValue::new(
            "test.echo",
            inputs[0].clone(),
        )]))))
    }
}

impl Calculation for TestCalc {
    fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    fn option_key(&self) -> &str {
        &self.key
    }

    fn title(&self) -> &str {
        "Test calculation"
    }

    fn derived_from(&self) -> Vec<String> {
        self.paths.clone()
    }

    fn debounce_delay(&self) -> Duration {
        self.delay
    }

    fn ttl(&self) -> Option<f64> {
        self.ttl
    }

    fn defaults(&self) -> Vec<Option<Value>> {
        self.defaults.clone()
    }

    fn properties(&self) -> Option<Map<String, Value>> {
        self.properties.clone()
    }

    fn start(&self, options: &Value) {
        *self.started_with.lock().unwrap() = Some(options.clone());
    }

    fn calculate(&self, inputs: &[Value]) -> Option<CalcFuture> {
        self.seen.lock().unwrap().push(inputs.to_vec());
        (self.respond)(inputs)
    }

    fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
    }
}
