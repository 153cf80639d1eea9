use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::Result,
    import::{ImportCsvRequest, ImportPreview, ImportResult},
};

pub async fn import_preview(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Json(req): Json<ImportCsvRequest>,
) -> Result<Json<ImportPreview>> {
    let preview = state.service_context.import_service.preview(&req.csv)?;
    Ok(Json(preview))
}

pub async fn import(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ImportCsvRequest>,
) -> Result<Json<ImportResult>> {
    let result = state
        .service_context
        .import_service
        .import(&user.actor(), &req.csv)
        .await?;
    Ok(Json(result))
}
