//! Calculation scheduling.
//!
//! Every registered [`Calculation`] is driven either reactively, by its own
//! task watching the change feeds of its input paths, or by one shared timer
//! that re-reads the current values. Both paths run the same evaluation:
//! TTL gate, calculate, then deliver or report the failure.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use crate::api::{ChangeFeed, ServerApi};
use crate::calculation::Calculation;
use crate::debounce::Debouncer;
use crate::delivery::deliver;
use crate::gate::EmitGate;

/// What re-runs the calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Recalculate when an input path changes.
    Reactive,
    /// Recalculate every registered calculation at a fixed period.
    Polled(Duration),
}

impl Trigger {
    /// Shortest polling period; a zero period is raised to this.
    pub const MIN_PERIOD: Duration = Duration::from_secs(1);

    fn normalized(self) -> Self {
        match self {
            Trigger::Polled(period) if period < Self::MIN_PERIOD => {
                warn!(
                    "Polling period {:?} too short, using {:?}",
                    period,
                    Self::MIN_PERIOD
                );
                Trigger::Polled(Self::MIN_PERIOD)
            }
            other => other,
        }
    }
}

/// A registered calculation and its gate state.
struct Registration {
    calculation: Arc<dyn Calculation>,
    paths: Vec<String>,
    defaults: Vec<Option<Value>>,
    gate: EmitGate,
}

impl Registration {
    fn new(calculation: Arc<dyn Calculation>, default_ttl: f64) -> Self {
        let paths = calculation.derived_from();
        let mut defaults = calculation.defaults();
        defaults.resize(paths.len(), None);
        let gate = EmitGate::new(calculation.ttl(), default_ttl);

        Self {
            calculation,
            paths,
            defaults,
            gate,
        }
    }

    fn name(&self) -> &str {
        self.calculation.option_key()
    }
}

/// Runs admitted calculations and routes their results.
#[derive(Clone)]
struct Dispatcher {
    api: Arc<dyn ServerApi>,
    plugin_id: Arc<str>,
}

impl Dispatcher {
    fn evaluate(&self, registration: &mut Registration, inputs: Vec<Value>, now: Instant) {
        if !registration.gate.admit(&inputs, now) {
            trace!("{}: unchanged inputs inside ttl, skipped", registration.name());
            return;
        }

        let Some(pending) = registration.calculation.calculate(&inputs) else {
            return;
        };

        let api = self.api.clone();
        let plugin_id = self.plugin_id.clone();
        let name = registration.name().to_string();
        tokio::spawn(async move {
            match pending.await {
                Ok(output) => {
                    deliver(api.as_ref(), &plugin_id, output);
                }
                Err(e) => {
                    error!("{}: {}", name, e);
                    api.set_provider_error(&plugin_id, &e.to_string());
                }
            }
        });
    }
}

/// Schedules calculations for one plugin.
pub struct Scheduler {
    dispatcher: Dispatcher,
    trigger: Trigger,
    default_ttl: f64,
    tasks: Vec<JoinHandle<()>>,
    polled: Arc<Mutex<Vec<Registration>>>,
    registered: usize,
}

impl Scheduler {
    pub fn new(api: Arc<dyn ServerApi>, plugin_id: &str, trigger: Trigger) -> Self {
        Self {
            dispatcher: Dispatcher {
                api,
                plugin_id: Arc::from(plugin_id),
            },
            trigger: trigger.normalized(),
            default_ttl: 0.0,
            tasks: Vec::new(),
            polled: Arc::new(Mutex::new(Vec::new())),
            registered: 0,
        }
    }

    /// TTL in seconds for calculations that do not set their own.
    pub fn with_default_ttl(mut self, default_ttl: f64) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Number of calculations currently scheduled.
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Start scheduling a calculation. Must be called inside a Tokio runtime.
    pub fn register(&mut self, calculation: Arc<dyn Calculation>) {
        let registration = Registration::new(calculation, self.default_ttl);
        if registration.paths.is_empty() {
            warn!("{}: no input paths, never triggered", registration.name());
        }
        debug!(
            "Registering {} derived from {:?} ({:?})",
            registration.name(),
            registration.paths,
            self.trigger
        );

        match self.trigger {
            Trigger::Reactive => {
                // Subscribe now so nothing published after registration is missed.
                let feeds: Vec<ChangeFeed> = registration
                    .paths
                    .iter()
                    .map(|path| self.dispatcher.api.self_stream(path))
                    .collect();
                let dispatcher = self.dispatcher.clone();
                self.tasks
                    .push(tokio::spawn(run_reactive(dispatcher, registration, feeds)));
            }
            Trigger::Polled(period) => {
                self.polled
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(registration);
                if self.tasks.is_empty() {
                    let dispatcher = self.dispatcher.clone();
                    let polled = self.polled.clone();
                    self.tasks
                        .push(tokio::spawn(run_polled(dispatcher, polled, period)));
                }
            }
        }
        self.registered += 1;
    }

    /// Unsubscribe everything and stop the timer. In-flight calculations
    /// are left to finish and still deliver.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.polled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.registered = 0;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// All slots filled, in path order.
fn complete(slots: &[Option<Value>]) -> Option<Vec<Value>> {
    slots.iter().cloned().collect()
}

async fn run_reactive(
    dispatcher: Dispatcher,
    mut registration: Registration,
    feeds: Vec<ChangeFeed>,
) {
    let mut slots = registration.defaults.clone();
    let mut debouncer = Debouncer::new(registration.calculation.debounce_delay());
    let mut changes = stream::select_all(
        feeds
            .into_iter()
            .enumerate()
            .map(|(index, feed)| feed.map(move |value| (index, value)).boxed()),
    );

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            change = changes.next() => {
                let Some((index, value)) = change else {
                    break;
                };
                slots[index] = Some(value);
                let Some(inputs) = complete(&slots) else {
                    continue;
                };
                let now = Instant::now();
                if let Some(inputs) = debouncer.offer(inputs, now) {
                    dispatcher.evaluate(&mut registration, inputs, now);
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let now = Instant::now();
                if let Some(inputs) = debouncer.expire(now) {
                    dispatcher.evaluate(&mut registration, inputs, now);
                }
            }
        }
    }

    debug!("{}: input feeds closed", registration.name());
}

async fn run_polled(
    dispatcher: Dispatcher,
    registrations: Arc<Mutex<Vec<Registration>>>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let mut guard = registrations.lock().unwrap_or_else(PoisonError::into_inner);
        for registration in guard.iter_mut() {
            let inputs: Option<Vec<Value>> = registration
                .paths
                .iter()
                .zip(&registration.defaults)
                .map(|(path, default)| {
                    dispatcher
                        .api
                        .get_self_path(path)
                        .or_else(|| default.clone())
                })
                .collect();

            match inputs {
                Some(inputs) => dispatcher.evaluate(registration, inputs, now),
                None => trace!("{}: inputs not available yet", registration.name()),
            }
        }
    }
}
