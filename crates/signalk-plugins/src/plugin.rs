//! Plugin lifecycle around a set of calculations.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::ServerApi;
use crate::calculation::Calculation;
use crate::scheduler::{Scheduler, Trigger};
use crate::schema::PluginSchema;

/// Identity of a plugin as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// A plugin made of calculations that are enabled through its configuration.
pub struct CalculationPlugin {
    info: PluginInfo,
    schema_title: String,
    api: Arc<dyn ServerApi>,
    calculations: Vec<Arc<dyn Calculation>>,
    trigger: Trigger,
    scheduler: Option<Scheduler>,
    options: Value,
}

impl CalculationPlugin {
    pub fn new(
        info: PluginInfo,
        api: Arc<dyn ServerApi>,
        calculations: Vec<Arc<dyn Calculation>>,
        trigger: Trigger,
    ) -> Self {
        Self {
            schema_title: info.name.clone(),
            info,
            api,
            calculations,
            trigger,
            scheduler: None,
            options: Value::Object(Default::default()),
        }
    }

    /// Title used for the configuration form, when it differs from the plugin name.
    pub fn with_schema_title(mut self, title: impl Into<String>) -> Self {
        self.schema_title = title.into();
        self
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn calculations(&self) -> &[Arc<dyn Calculation>] {
        &self.calculations
    }

    /// Options the plugin was last started with.
    pub fn options(&self) -> &Value {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Start every calculation enabled in `options`. A running plugin is
    /// stopped first. Returns the number of calculations scheduled.
    pub fn start(&mut self, options: Value) -> usize {
        self.stop();

        let default_ttl = options
            .get("default_ttl")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let mut scheduler = Scheduler::new(self.api.clone(), &self.info.id, self.trigger)
            .with_default_ttl(default_ttl);

        for calc in &self.calculations {
            if !is_enabled(&options, calc.as_ref()) {
                debug!("{} disabled", calc.option_key());
                continue;
            }
            calc.start(&options);
            scheduler.register(calc.clone());
        }

        let started = scheduler.registered();
        info!(
            "{} started with {} of {} calculation(s)",
            self.info.id,
            started,
            self.calculations.len()
        );
        self.api
            .set_provider_status(&self.info.id, &format!("Started {} calculation(s)", started));
        self.scheduler = Some(scheduler);
        self.options = options;
        started
    }

    /// Unsubscribe everything and give every calculation its `stop` call.
    pub fn stop(&mut self) {
        let Some(mut scheduler) = self.scheduler.take() else {
            return;
        };
        scheduler.stop();
        for calc in &self.calculations {
            calc.stop();
        }
        info!("{} stopped", self.info.id);
    }

    pub fn schema(&self) -> Value {
        PluginSchema::build(&self.schema_title, &self.calculations).schema
    }

    pub fn ui_schema(&self) -> Value {
        PluginSchema::build(&self.schema_title, &self.calculations).ui_schema
    }
}

impl Drop for CalculationPlugin {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whether the enable flag for `calc` is set, inside its group if it has one.
pub fn is_enabled(options: &Value, calc: &dyn Calculation) -> bool {
    let scope = match calc.group() {
        Some(group) => options.get(group),
        None => Some(options),
    };
    scope
        .and_then(|scope| scope.get(calc.option_key()))
        .is_some_and(truthy)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
