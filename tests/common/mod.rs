#![allow(dead_code)]

use std::sync::Arc;

use flock::{
    config::{LockoutMode, Settings},
    domain::{Actor, CreatePersonRequest, Person, Role},
    service::ServiceContext,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// A single-connection in-memory database; every connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.max_failed_attempts = 3;
    settings.auth.lockout_minutes = 15;
    settings.auth.lockout_mode = LockoutMode::Timed;
    settings
}

pub async fn test_context(settings: &Settings) -> anyhow::Result<Arc<ServiceContext>> {
    let pool = test_pool().await?;
    Ok(Arc::new(ServiceContext::new(pool, settings)))
}

pub fn system() -> Actor {
    Actor::system("test")
}

/// A person who can sign in with `password`.
pub async fn create_user(
    context: &ServiceContext,
    username: &str,
    role: Role,
    password: &str,
) -> anyhow::Result<Person> {
    use flock::service::CrudService;

    let mut request = CreatePersonRequest::new("Test", username);
    request.username = Some(username.to_string());
    request.role = role;
    request.password = Some(password.to_string());
    Ok(context.person_service.create(&system(), request).await?)
}
