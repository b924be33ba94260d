//! Duplicate suppression with a time-to-live.
//!
//! Identical input tuples are not recalculated until the TTL has passed, so
//! unchanged values are still re-published at a bounded rate. A changed
//! tuple always passes and restarts the window.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// Per-calculation emit gate.
#[derive(Debug)]
pub struct EmitGate {
    /// `None` disables suppression entirely.
    ttl: Option<Duration>,
    previous: Option<Vec<Value>>,
    next_allowed_emit: Option<Instant>,
}

impl EmitGate {
    /// Build a gate from a calculation TTL and the plugin default, both in seconds.
    ///
    /// Suppression is active when either is positive; the calculation's own
    /// value wins when set.
    pub fn new(calculation_ttl: Option<f64>, default_ttl: f64) -> Self {
        let enabled = calculation_ttl.is_some_and(|t| t > 0.0) || default_ttl > 0.0;
        let ttl = enabled.then(|| {
            let secs = calculation_ttl.unwrap_or(default_ttl);
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
        });

        Self {
            ttl,
            previous: None,
            next_allowed_emit: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some()
    }

    /// Decide whether `inputs` should be calculated at `now`.
    pub fn admit(&mut self, inputs: &[Value], now: Instant) -> bool {
        let Some(ttl) = self.ttl else {
            return true;
        };

        let unchanged = self.previous.as_deref() == Some(inputs);
        if unchanged && self.next_allowed_emit.is_some_and(|next| next > now) {
            return false;
        }

        self.next_allowed_emit = Some(now + ttl);
        if !unchanged {
            self.previous = Some(inputs.to_vec());
        }
        true
    }
}
