use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::extract_token,
    domain::{Actor, Person, PersonStatus, Role},
    error::AppError,
    repository::PersonRepository,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub person: Person,
}

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor::from(&self.person)
    }
}

/// Resolve the session token to a person who may still sign in.
async fn authenticate(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<Person, AppError> {
    let token = extract_token(jar, headers).ok_or(AppError::Unauthorized)?;

    let session = state
        .service_context
        .auth_service
        .validate_session(&token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let person = state
        .service_context
        .person_repo
        .find_by_id(session.person_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    match person.status {
        PersonStatus::Inactive | PersonStatus::Deceased => Err(AppError::Forbidden),
        _ => Ok(person),
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let person = authenticate(&state, &jar, request.headers()).await?;

    request.extensions_mut().insert(CurrentUser { person });

    Ok(next.run(request).await)
}

/// Admins, pastors and coordinators.
pub async fn require_staff(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let person = authenticate(&state, &jar, request.headers()).await?;

    if !person.role.is_staff() {
        tracing::debug!("{} ({}) denied staff route", person.username, person.role.as_str());
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { person });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let person = authenticate(&state, &jar, request.headers()).await?;

    if person.role != Role::Admin {
        tracing::debug!("{} ({}) denied admin route", person.username, person.role.as_str());
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { person });

    Ok(next.run(request).await)
}
