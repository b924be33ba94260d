//! Publishing calculation results.

use signalk_core::Delta;
use tracing::debug;

use crate::api::ServerApi;
use crate::calculation::CalcOutput;

/// Hand a calculation result to the host. Returns the number of deltas sent.
///
/// Plain values are wrapped in one self-vessel delta stamped with the
/// current time. Ready-made deltas are forwarded one by one. Empty results
/// send nothing.
pub fn deliver(api: &dyn ServerApi, plugin_id: &str, output: Option<CalcOutput>) -> usize {
    match output {
        None => 0,
        Some(output) if output.is_empty() => 0,
        Some(CalcOutput::Values(values)) => {
            let delta = Delta::with_values(api.self_context(), values);
            debug!("got delta: {:?}", delta);
            api.handle_message(plugin_id, delta);
            1
        }
        Some(CalcOutput::Deltas(deltas)) => {
            let count = deltas.len();
            for delta in deltas {
                api.handle_message(plugin_id, delta);
            }
            count
        }
    }
}
