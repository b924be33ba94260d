//! The calculation contract.

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use signalk_core::{Delta, PathValue};

use crate::error::CalcError;

/// Debounce used when a calculation does not declare one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(20);

/// What a successful calculation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcOutput {
    /// Values for the self vessel, delivered together as one delta.
    Values(Vec<PathValue>),
    /// Fully addressed deltas, each delivered on its own.
    Deltas(Vec<Delta>),
}

impl CalcOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            CalcOutput::Values(values) => values.is_empty(),
            CalcOutput::Deltas(deltas) => deltas.is_empty(),
        }
    }
}

/// Deferred result of one calculation cycle. `Ok(None)` means "nothing to publish".
pub type CalcFuture = BoxFuture<'static, Result<Option<CalcOutput>, CalcError>>;

/// A derived value computed from self paths.
///
/// Implementations are shared between the scheduler and HTTP handlers, so
/// any mutable state must live behind interior mutability.
pub trait Calculation: Send + Sync {
    /// Configuration group the enable flag is nested under.
    fn group(&self) -> Option<&str> {
        None
    }

    /// Key of the boolean enable flag.
    fn option_key(&self) -> &str;

    /// Human readable title for the configuration form.
    fn title(&self) -> &str;

    /// Self paths this calculation reads, in the order `calculate` receives them.
    /// Resolved once when the calculation is registered.
    fn derived_from(&self) -> Vec<String>;

    fn debounce_delay(&self) -> Duration {
        DEFAULT_DEBOUNCE
    }

    /// Seconds during which identical inputs are not recalculated.
    /// `None` falls back to the plugin's `default_ttl`.
    fn ttl(&self) -> Option<f64> {
        None
    }

    /// Values used for inputs that have not been published yet, by position.
    fn defaults(&self) -> Vec<Option<Value>> {
        Vec::new()
    }

    /// Extra configuration fields (JSON schema properties).
    fn properties(&self) -> Option<Map<String, Value>> {
        None
    }

    /// Called with the plugin configuration before the calculation is registered.
    fn start(&self, _options: &Value) {}

    /// Run one cycle. Returning `None` skips the cycle without a deferred result.
    fn calculate(&self, inputs: &[Value]) -> Option<CalcFuture>;

    /// Called when the plugin stops.
    fn stop(&self) {}
}
