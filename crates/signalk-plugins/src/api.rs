//! The host interface plugins are written against.
//!
//! This mirrors the subset of the Node.js server's `app` object that
//! calculation plugins use. [`ServerApi`] is implemented here for
//! [`signalk_server::ServerHandle`]; tests provide their own.

use std::path::PathBuf;

use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use signalk_core::Delta;
use signalk_server::ServerHandle;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// Infinite, non-restartable feed of new values for one self path.
pub type ChangeFeed = BoxStream<'static, Value>;

/// Host services available to plugins.
pub trait ServerApi: Send + Sync + 'static {
    /// Full self context, e.g. "vessels.urn:mrn:signalk:uuid:...".
    fn self_context(&self) -> String;

    /// Current value at a self path, if any.
    fn get_self_path(&self, path: &str) -> Option<Value>;

    /// Values published to a self path from now on.
    fn self_stream(&self, path: &str) -> ChangeFeed;

    /// Publish a delta on behalf of a plugin.
    fn handle_message(&self, plugin_id: &str, delta: Delta);

    /// Put the plugin into an error state with the given message.
    fn set_provider_error(&self, plugin_id: &str, message: &str);

    /// Report a non-error status message.
    fn set_provider_status(&self, _plugin_id: &str, _message: &str) {}

    /// Directory for plugin-owned files.
    fn config_path(&self) -> PathBuf;
}

impl ServerApi for ServerHandle {
    fn self_context(&self) -> String {
        ServerHandle::self_context(self)
    }

    fn get_self_path(&self, path: &str) -> Option<Value> {
        self.self_value(path)
    }

    fn self_stream(&self, path: &str) -> ChangeFeed {
        let rx = self.subscribe_self(path);
        let path = path.to_string();
        futures::stream::unfold(rx, move |mut rx| {
            let path = path.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(value) => return Some((value, rx)),
                        Err(RecvError::Lagged(n)) => {
                            warn!("Feed for {} skipped {} value(s)", path, n);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        })
        .boxed()
    }

    fn handle_message(&self, plugin_id: &str, delta: Delta) {
        ServerHandle::handle_message(self, plugin_id, delta);
    }

    fn set_provider_error(&self, plugin_id: &str, message: &str) {
        ServerHandle::set_provider_error(self, plugin_id, message);
    }

    fn set_provider_status(&self, plugin_id: &str, message: &str) {
        ServerHandle::set_provider_status(self, plugin_id, message);
    }

    fn config_path(&self) -> PathBuf {
        self.config().config_path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalk_core::PathValue;
    use signalk_server::{ServerConfig, SignalKServer};
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_stream_yields_published_values() {
        let server = SignalKServer::new(ServerConfig::default());
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        let api: &dyn ServerApi = &handle;
        let mut feed = api.self_stream("navigation.position");

        api.handle_message(
            "test",
            Delta::with_values(
                api.self_context(),
                vec![PathValue::new(
                    "navigation.position",
                    serde_json::json!({"latitude": 1.5, "longitude": 2.5}),
                )],
            ),
        );

        let value = tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .expect("value within timeout")
            .expect("feed open");
        assert_eq!(value["longitude"], 2.5);
        assert_eq!(api.get_self_path("navigation.position"), Some(value));

        task.abort();
    }
}
