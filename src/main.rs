// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::application::dashboard_controller::{TankDashboard, event_channel};
use crate::application::data_loader::DataLoader;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::oauth_provider::OAuthTokenProvider;
use crate::infrastructure::sheets_client::SheetsClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{get_tanks, health_check, reload, sign_in};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_dashboard_config()?;
    let groups = config.tank_groups()?;

    // External collaborators (infrastructure layer)
    let (events_tx, events_rx) = event_channel();
    let source = Arc::new(SheetsClient::new(
        config.sheets.spreadsheet_id.clone(),
        config.sheets.api_key.clone(),
        config.auth.access_token.clone(),
    ));
    let auth = Arc::new(OAuthTokenProvider::new(
        config.auth.access_token.clone(),
        config.auth.scope.clone(),
        events_tx.clone(),
    ));

    // Controller (application layer); its first event is the initial reload
    let loader = Arc::new(DataLoader::new(source, groups, config.sheets.fetch_timeout()));
    let dashboard = TankDashboard::new(loader, auth, events_tx, config.auth.sign_in_timeout());
    let state = Arc::new(AppState {
        dashboard: dashboard.handle(),
    });
    tokio::spawn(dashboard.run(events_rx));

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/tanks", get(get_tanks))
        .route("/reload", post(reload))
        .route("/sign-in", post(sign_in))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.server.listen.parse()?;
    tracing::info!("Starting tank-temps service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
