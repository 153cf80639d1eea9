use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{AttendanceHistory, ReportWeek},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct AttendanceParams {
    pub year: Option<i32>,
    pub week: Option<u32>,
}

/// Attendance before the given ISO week, or across all reports when no week
/// is given.
pub async fn attendance(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<AttendanceParams>,
) -> Result<Json<AttendanceHistory>> {
    let before = match (params.year, params.week) {
        (Some(year), Some(week)) => Some(ReportWeek::new(year, week)?),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "year and week must be given together".to_string(),
            ))
        }
    };

    let history = state
        .service_context
        .report_service
        .attendance(id, before)
        .await?;
    Ok(Json(history))
}
