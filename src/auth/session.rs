//! Server-side login sessions. The bearer token itself is never stored, only
//! its SHA-256 digest.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    repository::{parse_id, to_utc},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub person_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    person_id: String,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Session {
            id: parse_id(&row.id)?,
            person_id: parse_id(&row.person_id)?,
            created_at: to_utc(row.created_at),
            expires_at: to_utc(row.expires_at),
        })
    }
}

pub(crate) struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn open(&self, person_id: Uuid, token: &str, ttl: Duration) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            person_id,
            created_at: now,
            expires_at: now + ttl,
        };

        sqlx::query(
            "INSERT INTO sessions (id, person_id, token_hash, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(person_id.to_string())
        .bind(digest(token))
        .bind(session.created_at.naive_utc())
        .bind(session.expires_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(session)
    }

    /// The session behind `token` if it is still live at `now`.
    pub(crate) async fn lookup(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, person_id, created_at, expires_at FROM sessions WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(digest(token))
        .bind(now.naive_utc())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Session::try_from).transpose()
    }

    pub(crate) async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(digest(token))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn revoke_person(&self, person_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE person_id = ?")
            .bind(person_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now.naive_utc())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
