use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Cluster, CreateClusterRequest, UpdateClusterRequest},
    error::{AppError, Result},
    repository::{
        decode_ids, dedup_ids, encode_ids, is_unique_violation, parse_id, parse_opt_id, to_utc,
        ClusterRepository,
    },
};

const CLUSTER_COLUMNS: &str = r#"
    id, code, name, description, location, meeting_schedule, coordinator_id,
    branch_id, members, families, created_at, updated_at
"#;

#[derive(FromRow)]
struct ClusterRow {
    id: String,
    code: String,
    name: String,
    description: Option<String>,
    location: Option<String>,
    meeting_schedule: Option<String>,
    coordinator_id: Option<String>,
    branch_id: Option<String>,
    members: String,
    families: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteClusterRepository {
    pool: SqlitePool,
}

impl SqliteClusterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_cluster(row: ClusterRow) -> Result<Cluster> {
        Ok(Cluster {
            id: parse_id(&row.id)?,
            code: row.code,
            name: row.name,
            description: row.description,
            location: row.location,
            meeting_schedule: row.meeting_schedule,
            coordinator_id: parse_opt_id(row.coordinator_id)?,
            branch_id: parse_opt_id(row.branch_id)?,
            members: decode_ids(&row.members)?,
            families: decode_ids(&row.families)?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Cluster>> {
        let sql = format!("SELECT {} FROM clusters WHERE {} = ?", CLUSTER_COLUMNS, column);
        let row = sqlx::query_as::<_, ClusterRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_cluster).transpose()
    }
}

fn conflict_or_database(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Cluster code already exists".to_string())
    } else {
        AppError::Database(err.to_string())
    }
}

#[async_trait]
impl ClusterRepository for SqliteClusterRepository {
    async fn create(&self, request: CreateClusterRequest) -> Result<Cluster> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO clusters (
                id, code, name, description, location, meeting_schedule,
                coordinator_id, branch_id, members, families, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&request.code)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.location)
        .bind(&request.meeting_schedule)
        .bind(request.coordinator_id.map(|c| c.to_string()))
        .bind(request.branch_id.map(|b| b.to_string()))
        .bind(encode_ids(&dedup_ids(request.members))?)
        .bind(encode_ids(&dedup_ids(request.families))?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created cluster".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cluster>> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Cluster>> {
        self.find_one("code", code).await
    }

    async fn list_all(&self) -> Result<Vec<Cluster>> {
        let sql = format!("SELECT {} FROM clusters ORDER BY name", CLUSTER_COLUMNS);
        let rows = sqlx::query_as::<_, ClusterRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_cluster).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateClusterRequest) -> Result<Cluster> {
        if self.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("Cluster not found".to_string()));
        }

        // Rosters are replaced wholesale when present.
        let members = update.members.map(|m| encode_ids(&dedup_ids(m))).transpose()?;
        let families = update.families.map(|f| encode_ids(&dedup_ids(f))).transpose()?;

        sqlx::query(
            r#"
            UPDATE clusters
            SET code = COALESCE(?, code),
                name = COALESCE(?, name),
                description = CASE WHEN ? THEN ? ELSE description END,
                location = CASE WHEN ? THEN ? ELSE location END,
                meeting_schedule = CASE WHEN ? THEN ? ELSE meeting_schedule END,
                coordinator_id = CASE WHEN ? THEN ? ELSE coordinator_id END,
                branch_id = CASE WHEN ? THEN ? ELSE branch_id END,
                members = COALESCE(?, members),
                families = COALESCE(?, families),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.code)
        .bind(update.name)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.location.is_some())
        .bind(update.location.flatten())
        .bind(update.meeting_schedule.is_some())
        .bind(update.meeting_schedule.flatten())
        .bind(update.coordinator_id.is_some())
        .bind(update.coordinator_id.flatten().map(|c| c.to_string()))
        .bind(update.branch_id.is_some())
        .bind(update.branch_id.flatten().map(|b| b.to_string()))
        .bind(members)
        .bind(families)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated cluster".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM clusters WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cluster not found".to_string()));
        }
        Ok(())
    }
}
