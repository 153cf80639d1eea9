use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::AuthService,
    domain::{CreatePersonRequest, Person, PersonStatus, Role, UpdatePersonRequest},
    error::{AppError, Result},
    repository::{
        is_unique_violation, parse_id, parse_opt_id, remove_from_rosters, to_utc, PersonRepository,
    },
};

const PERSON_ROSTERS: [(&str, &str); 4] = [
    ("clusters", "members"),
    ("families", "members"),
    ("cluster_reports", "members_attended"),
    ("cluster_reports", "visitors_attended"),
];

const PERSON_COLUMNS: &str = r#"
    id, member_id, username, first_name, middle_name, last_name, suffix,
    email, phone, address, role, status, branch_id, date_of_birth,
    date_first_attended, water_baptism_date, spirit_baptism_date, notes,
    created_at, updated_at
"#;

#[derive(FromRow)]
struct PersonRow {
    id: String,
    member_id: Option<String>,
    username: String,
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
    suffix: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    role: String,
    status: String,
    branch_id: Option<String>,
    date_of_birth: Option<NaiveDate>,
    date_first_attended: Option<NaiveDate>,
    water_baptism_date: Option<NaiveDate>,
    spirit_baptism_date: Option<NaiveDate>,
    notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePersonRepository {
    pool: SqlitePool,
}

impl SqlitePersonRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_person(row: PersonRow) -> Result<Person> {
        Ok(Person {
            id: parse_id(&row.id)?,
            member_id: row.member_id,
            username: row.username,
            first_name: row.first_name,
            middle_name: row.middle_name,
            last_name: row.last_name,
            suffix: row.suffix,
            email: row.email,
            phone: row.phone,
            address: row.address,
            role: Role::from_str(&row.role)
                .ok_or_else(|| AppError::Database(format!("Invalid role: {}", row.role)))?,
            status: PersonStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid person status: {}", row.status)))?,
            branch_id: parse_opt_id(row.branch_id)?,
            date_of_birth: row.date_of_birth,
            date_first_attended: row.date_first_attended,
            water_baptism_date: row.water_baptism_date,
            spirit_baptism_date: row.spirit_baptism_date,
            notes: row.notes,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Person>> {
        let sql = format!("SELECT {} FROM people WHERE {} = ?", PERSON_COLUMNS, column);
        let row = sqlx::query_as::<_, PersonRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_person).transpose()
    }
}

fn conflict_or_database(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Username or member ID already exists".to_string())
    } else {
        AppError::Database(err.to_string())
    }
}

#[async_trait]
impl PersonRepository for SqlitePersonRepository {
    async fn create(&self, request: CreatePersonRequest) -> Result<Person> {
        let username = request
            .username
            .clone()
            .ok_or_else(|| AppError::Validation("username is required".to_string()))?;

        let password_hash = match request.password.as_deref() {
            Some(password) => Some(AuthService::hash_password(password).await?),
            None => None,
        };

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO people (
                id, member_id, username, first_name, middle_name, last_name, suffix,
                email, phone, address, role, status, branch_id, date_of_birth,
                date_first_attended, water_baptism_date, spirit_baptism_date, notes,
                password_hash, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&request.member_id)
        .bind(&username)
        .bind(&request.first_name)
        .bind(&request.middle_name)
        .bind(&request.last_name)
        .bind(&request.suffix)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.address)
        .bind(request.role.as_str())
        .bind(request.status.as_str())
        .bind(request.branch_id.map(|b| b.to_string()))
        .bind(request.date_of_birth)
        .bind(request.date_first_attended)
        .bind(request.water_baptism_date)
        .bind(request.spirit_baptism_date)
        .bind(&request.notes)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created person".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Person>> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Person>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Person>> {
        self.find_one("email", email).await
    }

    async fn find_by_member_id(&self, member_id: &str) -> Result<Option<Person>> {
        self.find_one("member_id", member_id).await
    }

    async fn list_all(&self) -> Result<Vec<Person>> {
        let sql = format!(
            "SELECT {} FROM people ORDER BY last_name, first_name",
            PERSON_COLUMNS
        );
        let rows = sqlx::query_as::<_, PersonRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_person).collect()
    }

    async fn count_by_role(&self, role: Role) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM people WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update(&self, id: Uuid, update: UpdatePersonRequest) -> Result<Person> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Person not found".to_string()))?;

        let role = update.role.unwrap_or(existing.role);
        let status = update.status.unwrap_or(existing.status);

        sqlx::query(
            r#"
            UPDATE people
            SET member_id = CASE WHEN ? THEN ? ELSE member_id END,
                first_name = COALESCE(?, first_name),
                middle_name = CASE WHEN ? THEN ? ELSE middle_name END,
                last_name = COALESCE(?, last_name),
                suffix = CASE WHEN ? THEN ? ELSE suffix END,
                email = CASE WHEN ? THEN ? ELSE email END,
                phone = CASE WHEN ? THEN ? ELSE phone END,
                address = CASE WHEN ? THEN ? ELSE address END,
                role = ?,
                status = ?,
                branch_id = CASE WHEN ? THEN ? ELSE branch_id END,
                date_of_birth = CASE WHEN ? THEN ? ELSE date_of_birth END,
                date_first_attended = CASE WHEN ? THEN ? ELSE date_first_attended END,
                water_baptism_date = CASE WHEN ? THEN ? ELSE water_baptism_date END,
                spirit_baptism_date = CASE WHEN ? THEN ? ELSE spirit_baptism_date END,
                notes = CASE WHEN ? THEN ? ELSE notes END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.member_id.is_some())
        .bind(update.member_id.flatten())
        .bind(update.first_name)
        .bind(update.middle_name.is_some())
        .bind(update.middle_name.flatten())
        .bind(update.last_name)
        .bind(update.suffix.is_some())
        .bind(update.suffix.flatten())
        .bind(update.email.is_some())
        .bind(update.email.flatten())
        .bind(update.phone.is_some())
        .bind(update.phone.flatten())
        .bind(update.address.is_some())
        .bind(update.address.flatten())
        .bind(role.as_str())
        .bind(status.as_str())
        .bind(update.branch_id.is_some())
        .bind(update.branch_id.flatten().map(|b| b.to_string()))
        .bind(update.date_of_birth.is_some())
        .bind(update.date_of_birth.flatten())
        .bind(update.date_first_attended.is_some())
        .bind(update.date_first_attended.flatten())
        .bind(update.water_baptism_date.is_some())
        .bind(update.water_baptism_date.flatten())
        .bind(update.spirit_baptism_date.is_some())
        .bind(update.spirit_baptism_date.flatten())
        .bind(update.notes.is_some())
        .bind(update.notes.flatten())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated person".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM people WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Person not found".to_string()));
        }

        // Single-valued references are cleared by ON DELETE SET NULL; the
        // JSON rosters need it done by hand.
        let mut touched = 0;
        for (table, column) in PERSON_ROSTERS {
            touched += remove_from_rosters(&mut *tx, table, column, id).await?;
        }

        tx.commit().await.map_err(|e| AppError::Database(e.to_string()))?;

        if touched > 0 {
            tracing::debug!("Removed person {} from {} rosters", id, touched);
        }
        Ok(())
    }

    async fn password_hash(&self, id: Uuid) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, Option<String>>(
            "SELECT password_hash FROM people WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(hash.flatten())
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<()> {
        sqlx::query("UPDATE people SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn record_failed_login(&self, id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE people
            SET failed_login_attempts = failed_login_attempts + 1
            WHERE id = ?
            RETURNING failed_login_attempts
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn reset_failed_logins(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE people SET failed_login_attempts = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
