use std::collections::HashMap;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{handlers::resources::paginate, middleware::auth::CurrentUser, state::AppState},
    domain::{
        ApprovedReset, AuditLog, LockedAccount, NewAuditEntry, PasswordResetRequest,
        ProcessResetRequest,
    },
    error::Result,
    export::{export_records, ExportFile, ExportFormat},
    listing::{ListQuery, Page},
    service::bulk::select_for_export,
};

pub async fn list_password_resets(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<PasswordResetRequest>>> {
    let resets = state.service_context.account_service.list_resets().await?;
    Ok(Json(paginate(&resets, &params, &state)?))
}

pub async fn approve_password_reset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<ProcessResetRequest>>,
) -> Result<Json<ApprovedReset>> {
    let process = body.map(|Json(b)| b).unwrap_or_default();
    let approved = state
        .service_context
        .account_service
        .approve_reset(&user.actor(), id, process)
        .await?;
    Ok(Json(approved))
}

pub async fn reject_password_reset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<ProcessResetRequest>>,
) -> Result<Json<PasswordResetRequest>> {
    let process = body.map(|Json(b)| b).unwrap_or_default();
    let rejected = state
        .service_context
        .account_service
        .reject_reset(&user.actor(), id, process)
        .await?;
    Ok(Json(rejected))
}

pub async fn list_locked_accounts(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<LockedAccount>>> {
    let locks = state.service_context.account_service.list_locks().await?;
    Ok(Json(paginate(&locks, &params, &state)?))
}

pub async fn unlock_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<LockedAccount>> {
    let lock = state
        .service_context
        .account_service
        .unlock(&user.actor(), id)
        .await?;
    Ok(Json(lock))
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<AuditLog>>> {
    let logs = state.service_context.audit_service.list_all().await?;
    Ok(Json(paginate(&logs, &params, &state)?))
}

#[derive(Debug, Deserialize)]
pub struct AuditExportRequest {
    pub format: ExportFormat,
    #[serde(default)]
    pub query: Option<ListQuery>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

pub async fn export_audit_logs(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<AuditExportRequest>,
) -> Result<ExportFile> {
    if let Some(query) = &request.query {
        query.validate_for::<AuditLog>()?;
    }
    let audit = &state.service_context.audit_service;
    let logs = audit.list_all().await?;
    let selected = select_for_export(&logs, None, request.query.as_ref());

    let file = export_records(&selected, request.format, request.columns.as_deref())?;

    audit
        .record(
            NewAuditEntry::new(&user.actor(), "export", "audit_log", None).with_details(format!(
                "{} records as {}",
                selected.len(),
                request.format.as_str()
            )),
        )
        .await;
    Ok(file)
}
