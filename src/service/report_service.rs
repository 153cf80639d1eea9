use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{ClusterRepository, PersonRepository, ReportRepository},
    service::{family_service::ensure_people_exist, AuditService, CrudService, ServiceContext},
};

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
    cluster_repo: Arc<dyn ClusterRepository>,
    person_repo: Arc<dyn PersonRepository>,
    audit: Arc<AuditService>,
}

impl ReportService {
    pub fn new(
        repo: Arc<dyn ReportRepository>,
        cluster_repo: Arc<dyn ClusterRepository>,
        person_repo: Arc<dyn PersonRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repo,
            cluster_repo,
            person_repo,
            audit,
        }
    }

    /// Who attended this cluster before `before` (or ever, without it).
    pub async fn attendance(
        &self,
        cluster_id: Uuid,
        before: Option<ReportWeek>,
    ) -> Result<AttendanceHistory> {
        if self.cluster_repo.find_by_id(cluster_id).await?.is_none() {
            return Err(AppError::NotFound("Cluster not found".to_string()));
        }
        let reports = self.repo.list_by_cluster(cluster_id).await?;
        Ok(AttendanceHistory::from_reports(&reports, before))
    }
}

#[async_trait]
impl CrudService for ReportService {
    type Item = ClusterWeeklyReport;
    type Create = CreateReportRequest;
    type Update = UpdateReportRequest;

    const ENTITY: &'static str = "cluster_report";

    fn from_context(context: &ServiceContext) -> &Self {
        &context.report_service
    }

    async fn list_all(&self) -> Result<Vec<ClusterWeeklyReport>> {
        self.repo.list_all().await
    }

    async fn get(&self, id: Uuid) -> Result<ClusterWeeklyReport> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))
    }

    async fn create(&self, actor: &Actor, request: CreateReportRequest) -> Result<ClusterWeeklyReport> {
        request.validate()?;
        let week = request.resolve_week()?;

        let cluster = self
            .cluster_repo
            .find_by_id(request.cluster_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown cluster: {}", request.cluster_id)))?;

        if self.repo.find_by_week(cluster.id, week).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "{} already has a report for {}",
                cluster.name, week
            )));
        }

        ensure_people_exist(self.person_repo.as_ref(), &request.members_attended).await?;
        ensure_people_exist(self.person_repo.as_ref(), &request.visitors_attended).await?;

        let report = self.repo.create(request, week, actor.id).await?;
        tracing::info!("Created report for {} {}", cluster.code, week);
        self.audit
            .record(
                NewAuditEntry::new(actor, "create", Self::ENTITY, Some(report.id))
                    .with_details(format!("{} {}", cluster.code, week)),
            )
            .await;
        Ok(report)
    }

    async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        request: UpdateReportRequest,
    ) -> Result<ClusterWeeklyReport> {
        request.validate()?;
        let existing = self.get(id).await?;

        // The meeting date may move within the week, never to another week.
        if let Some(Some(date)) = request.meeting_date {
            let moved_to = ReportWeek::containing(date);
            if moved_to != existing.week() {
                return Err(AppError::Validation(format!(
                    "Meeting date falls in {}, not {}",
                    moved_to,
                    existing.week()
                )));
            }
        }
        if let Some(members) = &request.members_attended {
            ensure_people_exist(self.person_repo.as_ref(), members).await?;
        }
        if let Some(visitors) = &request.visitors_attended {
            ensure_people_exist(self.person_repo.as_ref(), visitors).await?;
        }

        let report = self.repo.update(id, request).await?;
        self.audit
            .record(NewAuditEntry::new(actor, "update", Self::ENTITY, Some(id)))
            .await;
        Ok(report)
    }

    async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let report = self.get(id).await?;
        self.repo.delete(id).await?;
        self.audit
            .record(
                NewAuditEntry::new(actor, "delete", Self::ENTITY, Some(id))
                    .with_details(report.week().to_string()),
            )
            .await;
        Ok(())
    }
}
