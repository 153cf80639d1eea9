use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub mod session;

pub use session::Session;
use session::SessionStore;

pub const SESSION_COOKIE: &str = "session";

pub struct AuthService {
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            sessions: SessionStore::new(pool),
        }
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub async fn create_session(
        &self,
        person_id: Uuid,
        duration_hours: i64,
    ) -> Result<(Session, String)> {
        let token = generate_token();
        let session = self
            .sessions
            .open(person_id, &token, Duration::hours(duration_hours))
            .await?;
        Ok((session, token))
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        self.sessions.lookup(token, Utc::now()).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        if !self.sessions.revoke(token).await? {
            tracing::debug!("Logout for a session that was already gone");
        }
        Ok(())
    }

    /// Sign a person out everywhere, e.g. after an administrator resets their password.
    pub async fn invalidate_person_sessions(&self, person_id: Uuid) -> Result<()> {
        let revoked = self.sessions.revoke_person(person_id).await?;
        tracing::debug!("Revoked {} sessions for {}", revoked, person_id);
        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.sessions.purge_expired(Utc::now()).await
    }

    pub fn create_session_cookie(
        &self,
        token: &str,
        secure: bool,
        duration_hours: i64,
    ) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(secure)
            .max_age(cookie::time::Duration::hours(duration_hours))
            .build()
    }

    pub fn create_logout_cookie() -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }
}

/// Session token from the `session` cookie, or a `Bearer` token for scripted clients.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Random alphanumeric password handed to a person after an approved reset.
pub fn generate_temporary_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length.max(8))
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = AuthService::hash_password("correct horse").await.unwrap();
        assert!(AuthService::verify_password("correct horse", &hash).await.unwrap());
        assert!(!AuthService::verify_password("wrong horse", &hash).await.unwrap());
    }

    #[test]
    fn test_temporary_password_has_minimum_length() {
        assert_eq!(generate_temporary_password(12).len(), 12);
        assert_eq!(generate_temporary_password(3).len(), 8);
        assert!(generate_temporary_password(16).chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_bearer_token_is_used_without_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(extract_token(&CookieJar::new(), &headers), Some("abc123".to_string()));

        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        assert_eq!(extract_token(&jar, &headers), Some("from-cookie".to_string()));
        assert_eq!(extract_token(&CookieJar::new(), &HeaderMap::new()), None);
    }
}
