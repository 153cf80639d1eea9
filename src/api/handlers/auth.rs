use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    auth::{self, extract_token},
    domain::{Person, SubmitResetRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub person: Person,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let accounts = &state.service_context.account_service;
    let outcome = accounts.login(&req.username, &req.password).await?;

    let cookie = state.service_context.auth_service.create_session_cookie(
        &outcome.token,
        state.settings.auth.secure_cookies,
        accounts.session_hours(),
    );

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token: outcome.token,
            person: outcome.person,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(token) = extract_token(&jar, &headers) {
        // An unknown or expired token still ends in a cleared cookie.
        if let Err(e) = state.service_context.account_service.logout(&token).await {
            tracing::warn!("Failed to invalidate session on logout: {}", e);
        }
    }

    let jar = jar.add(auth::AuthService::create_logout_cookie());

    Ok((jar, StatusCode::NO_CONTENT))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<Person> {
    Json(user.person)
}

/// Same answer whether or not the username exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<SubmitResetRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state
        .service_context
        .account_service
        .request_reset(req)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If the account exists, an administrator will review the request".to_string(),
        }),
    ))
}
