use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateFamilyRequest, Family, UpdateFamilyRequest},
    error::{AppError, Result},
    repository::{
        decode_ids, dedup_ids, encode_ids, parse_id, parse_opt_id, remove_from_rosters, to_utc,
        FamilyRepository,
    },
};

#[derive(FromRow)]
struct FamilyRow {
    id: String,
    name: String,
    address: Option<String>,
    head_id: Option<String>,
    members: String,
    notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteFamilyRepository {
    pool: SqlitePool,
}

impl SqliteFamilyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_family(row: FamilyRow) -> Result<Family> {
        Ok(Family {
            id: parse_id(&row.id)?,
            name: row.name,
            address: row.address,
            head_id: parse_opt_id(row.head_id)?,
            members: decode_ids(&row.members)?,
            notes: row.notes,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }
}

#[async_trait]
impl FamilyRepository for SqliteFamilyRepository {
    async fn create(&self, request: CreateFamilyRequest) -> Result<Family> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let members = encode_ids(&dedup_ids(request.members))?;

        sqlx::query(
            r#"
            INSERT INTO families (id, name, address, head_id, members, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(&request.address)
        .bind(request.head_id.map(|h| h.to_string()))
        .bind(members)
        .bind(&request.notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created family".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Family>> {
        let row = sqlx::query_as::<_, FamilyRow>(
            r#"
            SELECT id, name, address, head_id, members, notes, created_at, updated_at
            FROM families
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_family).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Family>> {
        let rows = sqlx::query_as::<_, FamilyRow>(
            r#"
            SELECT id, name, address, head_id, members, notes, created_at, updated_at
            FROM families
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_family).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateFamilyRequest) -> Result<Family> {
        if self.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("Family not found".to_string()));
        }

        let members = update
            .members
            .map(|m| encode_ids(&dedup_ids(m)))
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE families
            SET name = COALESCE(?, name),
                address = CASE WHEN ? THEN ? ELSE address END,
                head_id = CASE WHEN ? THEN ? ELSE head_id END,
                members = COALESCE(?, members),
                notes = CASE WHEN ? THEN ? ELSE notes END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name)
        .bind(update.address.is_some())
        .bind(update.address.flatten())
        .bind(update.head_id.is_some())
        .bind(update.head_id.flatten().map(|h| h.to_string()))
        .bind(members)
        .bind(update.notes.is_some())
        .bind(update.notes.flatten())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated family".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM families WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Family not found".to_string()));
        }

        remove_from_rosters(&mut *tx, "clusters", "families", id).await?;
        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))
    }
}
