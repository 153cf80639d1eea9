use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        AuditLog, LockedAccount, NewAuditEntry, PasswordResetRequest, Person, ResetStatus,
    },
    error::{AppError, Result},
    repository::{
        parse_id, parse_opt_id, to_utc, AuditRepository, LockedAccountRepository,
        PasswordResetRepository,
    },
};

#[derive(FromRow)]
struct ResetRow {
    id: String,
    person_id: String,
    username: String,
    reason: Option<String>,
    status: String,
    requested_at: NaiveDateTime,
    processed_at: Option<NaiveDateTime>,
    processed_by: Option<String>,
    admin_notes: Option<String>,
}

pub struct SqlitePasswordResetRepository {
    pool: SqlitePool,
}

impl SqlitePasswordResetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_request(row: ResetRow) -> Result<PasswordResetRequest> {
        Ok(PasswordResetRequest {
            id: parse_id(&row.id)?,
            person_id: parse_id(&row.person_id)?,
            username: row.username,
            reason: row.reason,
            status: ResetStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid reset status: {}", row.status)))?,
            requested_at: to_utc(row.requested_at),
            processed_at: row.processed_at.map(to_utc),
            processed_by: parse_opt_id(row.processed_by)?,
            admin_notes: row.admin_notes,
        })
    }
}

#[async_trait]
impl PasswordResetRepository for SqlitePasswordResetRepository {
    async fn create(
        &self,
        person_id: Uuid,
        username: &str,
        reason: Option<String>,
    ) -> Result<PasswordResetRequest> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO password_reset_requests (id, person_id, username, reason, status, requested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(person_id.to_string())
        .bind(username)
        .bind(&reason)
        .bind(ResetStatus::Pending.as_str())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created reset request".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PasswordResetRequest>> {
        let row = sqlx::query_as::<_, ResetRow>(
            r#"
            SELECT id, person_id, username, reason, status, requested_at,
                   processed_at, processed_by, admin_notes
            FROM password_reset_requests
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_request).transpose()
    }

    async fn find_pending_for(&self, person_id: Uuid) -> Result<Option<PasswordResetRequest>> {
        let row = sqlx::query_as::<_, ResetRow>(
            r#"
            SELECT id, person_id, username, reason, status, requested_at,
                   processed_at, processed_by, admin_notes
            FROM password_reset_requests
            WHERE person_id = ? AND status = ?
            ORDER BY requested_at DESC
            LIMIT 1
            "#,
        )
        .bind(person_id.to_string())
        .bind(ResetStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_request).transpose()
    }

    async fn list_all(&self) -> Result<Vec<PasswordResetRequest>> {
        let rows = sqlx::query_as::<_, ResetRow>(
            r#"
            SELECT id, person_id, username, reason, status, requested_at,
                   processed_at, processed_by, admin_notes
            FROM password_reset_requests
            ORDER BY requested_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_request).collect()
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        status: ResetStatus,
        processed_by: Option<Uuid>,
        admin_notes: Option<String>,
    ) -> Result<PasswordResetRequest> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_requests
            SET status = ?, processed_at = ?, processed_by = ?, admin_notes = COALESCE(?, admin_notes)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now().naive_utc())
        .bind(processed_by.map(|p| p.to_string()))
        .bind(&admin_notes)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Reset request not found".to_string()));
        }

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve processed reset request".to_string())
        })
    }
}

#[derive(FromRow)]
struct LockRow {
    id: String,
    person_id: String,
    username: String,
    failed_attempts: i64,
    locked_at: NaiveDateTime,
    locked_until: Option<NaiveDateTime>,
    reason: String,
    unlocked_at: Option<NaiveDateTime>,
    unlocked_by: Option<String>,
}

pub struct SqliteLockedAccountRepository {
    pool: SqlitePool,
}

impl SqliteLockedAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_lock(row: LockRow) -> Result<LockedAccount> {
        Ok(LockedAccount {
            id: parse_id(&row.id)?,
            person_id: parse_id(&row.person_id)?,
            username: row.username,
            failed_attempts: row.failed_attempts,
            locked_at: to_utc(row.locked_at),
            locked_until: row.locked_until.map(to_utc),
            reason: row.reason,
            unlocked_at: row.unlocked_at.map(to_utc),
            unlocked_by: parse_opt_id(row.unlocked_by)?,
        })
    }
}

#[async_trait]
impl LockedAccountRepository for SqliteLockedAccountRepository {
    async fn create(
        &self,
        person: &Person,
        failed_attempts: i64,
        locked_until: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<LockedAccount> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO locked_accounts (
                id, person_id, username, failed_attempts, locked_at, locked_until, reason
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(person.id.to_string())
        .bind(&person.username)
        .bind(failed_attempts)
        .bind(Utc::now().naive_utc())
        .bind(locked_until.map(|t| t.naive_utc()))
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created lock".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LockedAccount>> {
        let row = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, person_id, username, failed_attempts, locked_at, locked_until,
                   reason, unlocked_at, unlocked_by
            FROM locked_accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_lock).transpose()
    }

    async fn find_active(
        &self,
        person_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<LockedAccount>> {
        let row = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, person_id, username, failed_attempts, locked_at, locked_until,
                   reason, unlocked_at, unlocked_by
            FROM locked_accounts
            WHERE person_id = ?
              AND unlocked_at IS NULL
              AND (locked_until IS NULL OR locked_until > ?)
            ORDER BY locked_at DESC
            LIMIT 1
            "#,
        )
        .bind(person_id.to_string())
        .bind(now.naive_utc())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_lock).transpose()
    }

    async fn list_all(&self) -> Result<Vec<LockedAccount>> {
        let rows = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, person_id, username, failed_attempts, locked_at, locked_until,
                   reason, unlocked_at, unlocked_by
            FROM locked_accounts
            ORDER BY locked_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_lock).collect()
    }

    async fn unlock(&self, id: Uuid, unlocked_by: Option<Uuid>) -> Result<LockedAccount> {
        let result = sqlx::query(
            "UPDATE locked_accounts SET unlocked_at = ?, unlocked_by = ? WHERE id = ? AND unlocked_at IS NULL",
        )
        .bind(Utc::now().naive_utc())
        .bind(unlocked_by.map(|u| u.to_string()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let lock = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Locked account not found".to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Account is already unlocked".to_string()));
        }
        Ok(lock)
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: String,
    actor_id: Option<String>,
    actor_username: Option<String>,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    details: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: AuditRow) -> Result<AuditLog> {
        Ok(AuditLog {
            id: parse_id(&row.id)?,
            actor_id: parse_opt_id(row.actor_id)?,
            actor_username: row.actor_username,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: parse_opt_id(row.entity_id)?,
            details: row.details,
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditLog> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, actor_id, actor_username, action, entity_type, entity_id, details, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(entry.actor_id.map(|a| a.to_string()))
        .bind(&entry.actor_username)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id.map(|e| e.to_string()))
        .bind(&entry.details)
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(AuditLog {
            id,
            actor_id: entry.actor_id,
            actor_username: entry.actor_username,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: now,
        })
    }

    async fn list_all(&self) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, actor_id, actor_username, action, entity_type, entity_id, details, created_at
            FROM audit_logs
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_log).collect()
    }
}
