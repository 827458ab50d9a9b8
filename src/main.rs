mod models;
mod handlers;
mod routes;
mod docs;
mod websocket;
mod config;
mod ws;

use config::Config;
use routes::api::create_app;
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use std::panic;
use ws::hub::{Hub, SharedHub};
use ws::registry::EVICTION_GRACE_PERIOD;
use ws::transport::ChannelTransport;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub hub: SharedHub,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Pick up app.env/.env so LOG_LEVEL is visible before the log filter is built
    Config::load_env_files();
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to the configured level, but allow debug for our app
            config::default_log_filter(&log_level).into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    if config.is_development() {
        info!("Running in development mode");
    }

    // Rooms live for the lifetime of the process only
    let state = AppState {
        hub: Hub::start(ChannelTransport::new(), EVICTION_GRACE_PERIOD),
    };

    let app_routes = create_app(state, &config);

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 CollabPad running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());
    info!("📁 Serving client files from {}", config.static_dir);

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
