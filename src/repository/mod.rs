use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};

pub mod account_repository;
pub mod branch_repository;
pub mod cluster_repository;
pub mod family_repository;
pub mod person_repository;
pub mod report_repository;

pub use account_repository::{
    SqliteAuditRepository, SqliteLockedAccountRepository, SqlitePasswordResetRepository,
};
pub use branch_repository::SqliteBranchRepository;
pub use cluster_repository::SqliteClusterRepository;
pub use family_repository::SqliteFamilyRepository;
pub use person_repository::SqlitePersonRepository;
pub use report_repository::SqliteReportRepository;

#[async_trait]
pub trait PersonRepository: Send + Sync {
    /// `request.username` must already be resolved.
    async fn create(&self, request: CreatePersonRequest) -> Result<Person>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Person>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Person>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Person>>;
    async fn find_by_member_id(&self, member_id: &str) -> Result<Option<Person>>;
    async fn list_all(&self) -> Result<Vec<Person>>;
    async fn count_by_role(&self, role: Role) -> Result<i64>;
    async fn update(&self, id: Uuid, update: UpdatePersonRequest) -> Result<Person>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn password_hash(&self, id: Uuid) -> Result<Option<String>>;
    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<()>;
    /// Increment and return the consecutive failed login counter.
    async fn record_failed_login(&self, id: Uuid) -> Result<i64>;
    async fn reset_failed_logins(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait FamilyRepository: Send + Sync {
    async fn create(&self, request: CreateFamilyRequest) -> Result<Family>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Family>>;
    async fn list_all(&self) -> Result<Vec<Family>>;
    async fn update(&self, id: Uuid, update: UpdateFamilyRequest) -> Result<Family>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn create(&self, request: CreateClusterRequest) -> Result<Cluster>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cluster>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Cluster>>;
    async fn list_all(&self) -> Result<Vec<Cluster>>;
    async fn update(&self, id: Uuid, update: UpdateClusterRequest) -> Result<Cluster>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(
        &self,
        request: CreateReportRequest,
        week: ReportWeek,
        submitted_by: Option<Uuid>,
    ) -> Result<ClusterWeeklyReport>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ClusterWeeklyReport>>;
    async fn find_by_week(
        &self,
        cluster_id: Uuid,
        week: ReportWeek,
    ) -> Result<Option<ClusterWeeklyReport>>;
    async fn list_all(&self) -> Result<Vec<ClusterWeeklyReport>>;
    async fn list_by_cluster(&self, cluster_id: Uuid) -> Result<Vec<ClusterWeeklyReport>>;
    async fn update(&self, id: Uuid, update: UpdateReportRequest) -> Result<ClusterWeeklyReport>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn create(&self, request: CreateBranchRequest) -> Result<Branch>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Branch>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Branch>>;
    async fn list_all(&self) -> Result<Vec<Branch>>;
    async fn update(&self, id: Uuid, update: UpdateBranchRequest) -> Result<Branch>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(
        &self,
        person_id: Uuid,
        username: &str,
        reason: Option<String>,
    ) -> Result<PasswordResetRequest>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PasswordResetRequest>>;
    async fn find_pending_for(&self, person_id: Uuid) -> Result<Option<PasswordResetRequest>>;
    async fn list_all(&self) -> Result<Vec<PasswordResetRequest>>;
    async fn mark_processed(
        &self,
        id: Uuid,
        status: ResetStatus,
        processed_by: Option<Uuid>,
        admin_notes: Option<String>,
    ) -> Result<PasswordResetRequest>;
}

#[async_trait]
pub trait LockedAccountRepository: Send + Sync {
    async fn create(
        &self,
        person: &Person,
        failed_attempts: i64,
        locked_until: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<LockedAccount>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<LockedAccount>>;
    /// The lock currently keeping `person_id` out, if any.
    async fn find_active(&self, person_id: Uuid, now: DateTime<Utc>)
        -> Result<Option<LockedAccount>>;
    async fn list_all(&self) -> Result<Vec<LockedAccount>>;
    async fn unlock(&self, id: Uuid, unlocked_by: Option<Uuid>) -> Result<LockedAccount>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> Result<AuditLog>;
    async fn list_all(&self) -> Result<Vec<AuditLog>>;
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_opt_id(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

pub(crate) fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

/// ID rosters are stored as a JSON array in a TEXT column.
pub(crate) fn encode_ids(ids: &[Uuid]) -> Result<String> {
    serde_json::to_string(ids).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn decode_ids(raw: &str) -> Result<Vec<Uuid>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| AppError::Database(format!("Invalid id list: {}", e)))
}

/// Drop `id` from every roster held in `table.column`.
pub(crate) async fn remove_from_rosters(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    id: Uuid,
) -> Result<u64> {
    let select = format!("SELECT id, {column} FROM {table} WHERE {column} LIKE ?");
    let rows = sqlx::query_as::<_, (String, String)>(&select)
        .bind(format!("%{}%", id))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let update = format!("UPDATE {table} SET {column} = ? WHERE id = ?");
    let mut touched = 0;
    for (row_id, raw) in rows {
        let remaining: Vec<Uuid> = decode_ids(&raw)?.into_iter().filter(|m| *m != id).collect();
        sqlx::query(&update)
            .bind(encode_ids(&remaining)?)
            .bind(row_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        touched += 1;
    }
    Ok(touched)
}

/// Keep the first occurrence of each id.
pub(crate) fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}
