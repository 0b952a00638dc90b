// HTTP request handlers
use crate::application::data_loader::LoadTarget;
use crate::domain::error::LoadError;
use crate::presentation::app_state::AppState;
use crate::presentation::view_model::{DashboardView, dashboard_to_view};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct ReloadQuery {
    pub group: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current load state and per-tank readings, in declared tank order
pub async fn get_tanks(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    let snapshot = state.dashboard.snapshot();
    Json(dashboard_to_view(&snapshot))
}

/// Trigger a reload of every group, or of `?group=Name`
pub async fn reload(
    Query(query): Query<ReloadQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let target = match query.group {
        Some(name) => LoadTarget::Group(name),
        None => LoadTarget::All,
    };

    let result = state.dashboard.reload(target).await;
    if let Err(e) = &result {
        tracing::warn!("Reload rejected: {}", e);
    }
    let status = load_status(&result);
    let body = match result {
        Ok(()) => "reload started".to_string(),
        Err(e) => e.to_string(),
    };
    (status, body)
}

/// Start sign-in without loading anything. Like every authorized call it
/// replaces whatever call is still waiting for sign-in.
pub async fn sign_in(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state
        .dashboard
        .request_authorized_call(Box::new(|| tracing::info!("Session authorized")))
        .await;

    let status = load_status(&result);
    let body = match result {
        Ok(()) => "sign-in requested".to_string(),
        Err(e) => e.to_string(),
    };
    (status, body)
}

fn load_status(result: &Result<(), LoadError>) -> StatusCode {
    match result {
        Ok(()) => StatusCode::ACCEPTED,
        Err(LoadError::InProgress) => StatusCode::CONFLICT,
        Err(LoadError::UnknownGroup(_)) => StatusCode::NOT_FOUND,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
