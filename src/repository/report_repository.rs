use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        ClusterWeeklyReport, CreateReportRequest, GatheringType, ReportWeek, UpdateReportRequest,
    },
    error::{AppError, Result},
    repository::{
        decode_ids, dedup_ids, encode_ids, is_unique_violation, parse_id, parse_opt_id, to_utc,
        ReportRepository,
    },
};

const REPORT_COLUMNS: &str = r#"
    id, cluster_id, year, week_number, meeting_date, gathering_type,
    members_attended, visitors_attended, activities, prayer_requests,
    testimonies, highlights, lowlights, offering_cents, submitted_by,
    created_at, updated_at
"#;

#[derive(FromRow)]
struct ReportRow {
    id: String,
    cluster_id: String,
    year: i64,
    week_number: i64,
    meeting_date: Option<NaiveDate>,
    gathering_type: String,
    members_attended: String,
    visitors_attended: String,
    activities: Option<String>,
    prayer_requests: Option<String>,
    testimonies: Option<String>,
    highlights: Option<String>,
    lowlights: Option<String>,
    offering_cents: i64,
    submitted_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteReportRepository {
    pool: SqlitePool,
}

impl SqliteReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_report(row: ReportRow) -> Result<ClusterWeeklyReport> {
        let year = i32::try_from(row.year)
            .map_err(|_| AppError::Database(format!("Invalid report year: {}", row.year)))?;
        let week_number = u32::try_from(row.week_number)
            .map_err(|_| AppError::Database(format!("Invalid week number: {}", row.week_number)))?;

        Ok(ClusterWeeklyReport {
            id: parse_id(&row.id)?,
            cluster_id: parse_id(&row.cluster_id)?,
            year,
            week_number,
            meeting_date: row.meeting_date,
            gathering_type: GatheringType::from_str(&row.gathering_type).ok_or_else(|| {
                AppError::Database(format!("Invalid gathering type: {}", row.gathering_type))
            })?,
            members_attended: decode_ids(&row.members_attended)?,
            visitors_attended: decode_ids(&row.visitors_attended)?,
            activities: row.activities,
            prayer_requests: row.prayer_requests,
            testimonies: row.testimonies,
            highlights: row.highlights,
            lowlights: row.lowlights,
            offering_cents: row.offering_cents,
            submitted_by: parse_opt_id(row.submitted_by)?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch(&self, sql: &str, binds: &[String]) -> Result<Vec<ClusterWeeklyReport>> {
        let mut query = sqlx::query_as::<_, ReportRow>(sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_report).collect()
    }
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn create(
        &self,
        request: CreateReportRequest,
        week: ReportWeek,
        submitted_by: Option<Uuid>,
    ) -> Result<ClusterWeeklyReport> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO cluster_reports (
                id, cluster_id, year, week_number, meeting_date, gathering_type,
                members_attended, visitors_attended, activities, prayer_requests,
                testimonies, highlights, lowlights, offering_cents, submitted_by,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(request.cluster_id.to_string())
        .bind(week.year)
        .bind(week.week as i64)
        .bind(request.meeting_date)
        .bind(request.gathering_type.as_str())
        .bind(encode_ids(&dedup_ids(request.members_attended))?)
        .bind(encode_ids(&dedup_ids(request.visitors_attended))?)
        .bind(&request.activities)
        .bind(&request.prayer_requests)
        .bind(&request.testimonies)
        .bind(&request.highlights)
        .bind(&request.lowlights)
        .bind(request.offering_cents)
        .bind(submitted_by.map(|s| s.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("A report for {} already exists", week))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created report".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ClusterWeeklyReport>> {
        let sql = format!("SELECT {} FROM cluster_reports WHERE id = ?", REPORT_COLUMNS);
        Ok(self.fetch(&sql, &[id.to_string()]).await?.into_iter().next())
    }

    async fn find_by_week(
        &self,
        cluster_id: Uuid,
        week: ReportWeek,
    ) -> Result<Option<ClusterWeeklyReport>> {
        let sql = format!(
            "SELECT {} FROM cluster_reports WHERE cluster_id = ? AND year = ? AND week_number = ?",
            REPORT_COLUMNS
        );
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(cluster_id.to_string())
            .bind(week.year)
            .bind(week.week as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_report).transpose()
    }

    async fn list_all(&self) -> Result<Vec<ClusterWeeklyReport>> {
        let sql = format!(
            "SELECT {} FROM cluster_reports ORDER BY year DESC, week_number DESC",
            REPORT_COLUMNS
        );
        self.fetch(&sql, &[]).await
    }

    async fn list_by_cluster(&self, cluster_id: Uuid) -> Result<Vec<ClusterWeeklyReport>> {
        let sql = format!(
            "SELECT {} FROM cluster_reports WHERE cluster_id = ? ORDER BY year, week_number",
            REPORT_COLUMNS
        );
        self.fetch(&sql, &[cluster_id.to_string()]).await
    }

    async fn update(&self, id: Uuid, update: UpdateReportRequest) -> Result<ClusterWeeklyReport> {
        if self.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("Report not found".to_string()));
        }

        let members = update
            .members_attended
            .map(|m| encode_ids(&dedup_ids(m)))
            .transpose()?;
        let visitors = update
            .visitors_attended
            .map(|v| encode_ids(&dedup_ids(v)))
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE cluster_reports
            SET meeting_date = CASE WHEN ? THEN ? ELSE meeting_date END,
                gathering_type = COALESCE(?, gathering_type),
                members_attended = COALESCE(?, members_attended),
                visitors_attended = COALESCE(?, visitors_attended),
                activities = CASE WHEN ? THEN ? ELSE activities END,
                prayer_requests = CASE WHEN ? THEN ? ELSE prayer_requests END,
                testimonies = CASE WHEN ? THEN ? ELSE testimonies END,
                highlights = CASE WHEN ? THEN ? ELSE highlights END,
                lowlights = CASE WHEN ? THEN ? ELSE lowlights END,
                offering_cents = COALESCE(?, offering_cents),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.meeting_date.is_some())
        .bind(update.meeting_date.flatten())
        .bind(update.gathering_type.map(|g| g.as_str()))
        .bind(members)
        .bind(visitors)
        .bind(update.activities.is_some())
        .bind(update.activities.flatten())
        .bind(update.prayer_requests.is_some())
        .bind(update.prayer_requests.flatten())
        .bind(update.testimonies.is_some())
        .bind(update.testimonies.flatten())
        .bind(update.highlights.is_some())
        .bind(update.highlights.flatten())
        .bind(update.lowlights.is_some())
        .bind(update.lowlights.flatten())
        .bind(update.offering_cents)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated report".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM cluster_reports WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Report not found".to_string()));
        }
        Ok(())
    }
}
