//! Handlers shared by every managed collection, dispatched through
//! [`CrudService`].

use std::collections::HashMap;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::Result,
    export::ExportFile,
    listing::{ListQuery, Listable, Page},
    service::{
        bulk::{self, BulkDeleteRequest, BulkDeleteResult, ExportRequest},
        CrudService,
    },
};

pub async fn list<S: CrudService>(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<S::Item>>> {
    let items = S::from_context(&state.service_context).list_all().await?;
    Ok(Json(paginate(&items, &params, &state)?))
}

/// Run a query-string list request over a loaded collection.
pub(crate) fn paginate<T: Listable + Clone>(
    items: &[T],
    params: &HashMap<String, String>,
    state: &AppState,
) -> Result<Page<T>> {
    let query = ListQuery::from_params(params, &state.settings.listing)?;
    query.validate_for::<T>()?;
    Ok(query.apply(items))
}

pub async fn get<S: CrudService>(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<S::Item>> {
    let item = S::from_context(&state.service_context).get(id).await?;
    Ok(Json(item))
}

pub async fn create<S: CrudService>(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<S::Create>,
) -> Result<(StatusCode, Json<S::Item>)> {
    let item = S::from_context(&state.service_context)
        .create(&user.actor(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update<S: CrudService>(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<S::Update>,
) -> Result<Json<S::Item>> {
    let item = S::from_context(&state.service_context)
        .update(&user.actor(), id, request)
        .await?;
    Ok(Json(item))
}

pub async fn delete<S: CrudService>(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    S::from_context(&state.service_context)
        .delete(&user.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_delete<S: CrudService>(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResult>> {
    let context = &state.service_context;
    let result = bulk::bulk_delete(
        S::from_context(context),
        &context.audit_service,
        &user.actor(),
        request,
    )
    .await?;
    Ok(Json(result))
}

pub async fn export<S: CrudService>(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ExportRequest>,
) -> Result<ExportFile> {
    let context = &state.service_context;
    bulk::export(
        S::from_context(context),
        &context.audit_service,
        &user.actor(),
        request,
    )
    .await
}
