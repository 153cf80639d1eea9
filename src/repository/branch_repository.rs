use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Branch, CreateBranchRequest, UpdateBranchRequest},
    error::{AppError, Result},
    repository::{is_unique_violation, parse_id, to_utc, BranchRepository},
};

#[derive(FromRow)]
struct BranchRow {
    id: String,
    code: String,
    name: String,
    address: Option<String>,
    is_active: i32,
    is_headquarters: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteBranchRepository {
    pool: SqlitePool,
}

impl SqliteBranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_branch(row: BranchRow) -> Result<Branch> {
        Ok(Branch {
            id: parse_id(&row.id)?,
            code: row.code,
            name: row.name,
            address: row.address,
            is_active: row.is_active != 0,
            is_headquarters: row.is_headquarters != 0,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Branch>> {
        let sql = format!(
            r#"
            SELECT id, code, name, address, is_active, is_headquarters, created_at, updated_at
            FROM branches
            WHERE {} = ?
            "#,
            column
        );
        let row = sqlx::query_as::<_, BranchRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_branch).transpose()
    }
}

fn conflict_or_database(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Branch code already exists".to_string())
    } else {
        AppError::Database(err.to_string())
    }
}

#[async_trait]
impl BranchRepository for SqliteBranchRepository {
    async fn create(&self, request: CreateBranchRequest) -> Result<Branch> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        // Only one headquarters at a time.
        if request.is_headquarters {
            sqlx::query("UPDATE branches SET is_headquarters = 0 WHERE is_headquarters = 1")
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        sqlx::query(
            r#"
            INSERT INTO branches (id, code, name, address, is_active, is_headquarters, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&request.code)
        .bind(&request.name)
        .bind(&request.address)
        .bind(request.is_active as i32)
        .bind(request.is_headquarters as i32)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_database)?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created branch".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Branch>> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Branch>> {
        self.find_one("code", code).await
    }

    async fn list_all(&self) -> Result<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>(
            r#"
            SELECT id, code, name, address, is_active, is_headquarters, created_at, updated_at
            FROM branches
            ORDER BY is_headquarters DESC, name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_branch).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateBranchRequest) -> Result<Branch> {
        if self.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("Branch not found".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        if update.is_headquarters == Some(true) {
            sqlx::query("UPDATE branches SET is_headquarters = 0 WHERE id != ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        sqlx::query(
            r#"
            UPDATE branches
            SET code = COALESCE(?, code),
                name = COALESCE(?, name),
                address = CASE WHEN ? THEN ? ELSE address END,
                is_active = COALESCE(?, is_active),
                is_headquarters = COALESCE(?, is_headquarters),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.code)
        .bind(&update.name)
        .bind(update.address.is_some())
        .bind(update.address.flatten())
        .bind(update.is_active.map(|b| b as i32))
        .bind(update.is_headquarters.map(|b| b as i32))
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_database)?;

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated branch".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM branches WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Branch not found".to_string()));
        }
        Ok(())
    }
}
