use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{
    api::state::AppState,
    domain::{CreatePersonRequest, Person},
    error::Result,
};

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Flock API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Membership administration for churches and their clusters",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "setup": "/setup",
            "auth": "/auth/login",
            "api": "/api",
            "admin": "/api/admin"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn setup_status(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let needs_setup = state.service_context.account_service.needs_setup().await?;
    Ok(Json(json!({ "needs_setup": needs_setup })))
}

/// Create the first administrator.
pub async fn setup(
    State(state): State<AppState>,
    Json(request): Json<CreatePersonRequest>,
) -> Result<(StatusCode, Json<Person>)> {
    let person = state
        .service_context
        .account_service
        .setup_admin(request)
        .await?;
    Ok((StatusCode::CREATED, Json(person)))
}
