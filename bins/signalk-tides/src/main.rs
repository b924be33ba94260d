use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalk_core::{
    ConfigError, ConfigStorage, Delta, FileConfigStorage, PathValue, PluginConfig, TriggerMode,
    SELF_CONTEXT,
};
use signalk_plugins::{ServerApi, Trigger};
use signalk_providers::{tides_plugin, ReqwestFetcher, TideProviders, PLUGIN_ID};
use signalk_server::{ServerConfig, ServerHandle, SignalKServer};
use signalk_web::{create_router, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,signalk_plugins=debug,signalk_providers=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("SignalK tides starting...");

    // Configuration
    let storage = Arc::new(FileConfigStorage::from_env());
    let mut settings = storage.load_settings()?;
    if settings.ensure_self_urn() {
        storage.save_settings(&settings)?;
    }
    let self_urn = settings.self_urn.clone().unwrap_or_default();
    let http_addr = SocketAddr::from(([0, 0, 0, 0], settings.port()));

    let config = ServerConfig {
        self_urn: format!("vessels.{}", self_urn),
        config_path: storage.config_path().to_path_buf(),
        ..ServerConfig::default()
    };

    // SignalK host
    let server = SignalKServer::new(config);
    let handle = server.handle();
    let server_handle = tokio::spawn(server.run());

    // Tides plugin
    let trigger = match settings.trigger {
        TriggerMode::Reactive => Trigger::Reactive,
        TriggerMode::Polled => Trigger::Polled(Duration::from_secs(settings.poll_interval_secs())),
    };
    let api: Arc<dyn ServerApi> = Arc::new(handle.clone());
    let fetcher = Arc::new(ReqwestFetcher::new()?);
    let providers = TideProviders::new(api.clone(), fetcher);
    let mut plugin = tides_plugin(api, &providers, trigger);

    let plugin_config = match storage.load_plugin_config(PLUGIN_ID) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => PluginConfig::default(),
        Err(e) => return Err(e.into()),
    };
    if plugin_config.enabled {
        plugin.start(plugin_config.configuration);
    } else {
        tracing::info!("{} is disabled", PLUGIN_ID);
    }

    let state = Arc::new(ServerState::new(
        handle.clone(),
        storage,
        plugin,
        Some(providers.noaa.clone()),
    ));

    // Start HTTP API server
    let app = create_router(state.clone()).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!("HTTP server listening on {}", http_addr);
    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    let demo_handle = tokio::spawn(async move {
        if settings.demo {
            generate_demo_data(handle).await;
        } else {
            std::future::pending::<()>().await;
        }
    });

    tracing::info!("   HTTP API:  http://localhost:{}/signalk/v1/api", http_addr.port());
    tracing::info!(
        "   Tides:     http://localhost:{}/signalk/v1/api/resources/tides/closest",
        http_addr.port()
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = server_handle => {
            tracing::warn!("SignalK host stopped");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = demo_handle => {
            tracing::warn!("Demo data generator stopped");
        }
    }

    state.plugin.lock().await.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Simulated vessel drifting along the US east coast.
async fn generate_demo_data(server: ServerHandle) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut latitude = 42.3539;
    let mut longitude = -71.0503;

    loop {
        interval.tick().await;

        latitude += 0.00001;
        longitude += 0.00002;

        let delta = Delta::with_values(
            SELF_CONTEXT,
            vec![PathValue::new(
                "navigation.position",
                json!({ "latitude": latitude, "longitude": longitude }),
            )],
        );
        server.handle_message("demo.generator", delta);
    }
}
