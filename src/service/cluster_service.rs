use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{BranchRepository, ClusterRepository, FamilyRepository, PersonRepository},
    service::{family_service::ensure_people_exist, AuditService, CrudService, ServiceContext},
};

pub struct ClusterService {
    repo: Arc<dyn ClusterRepository>,
    person_repo: Arc<dyn PersonRepository>,
    family_repo: Arc<dyn FamilyRepository>,
    branch_repo: Arc<dyn BranchRepository>,
    audit: Arc<AuditService>,
}

impl ClusterService {
    pub fn new(
        repo: Arc<dyn ClusterRepository>,
        person_repo: Arc<dyn PersonRepository>,
        family_repo: Arc<dyn FamilyRepository>,
        branch_repo: Arc<dyn BranchRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repo,
            person_repo,
            family_repo,
            branch_repo,
            audit,
        }
    }

    async fn check_references(
        &self,
        coordinator_id: Option<Uuid>,
        branch_id: Option<Uuid>,
        members: Option<&[Uuid]>,
        families: Option<&[Uuid]>,
    ) -> Result<()> {
        if let Some(coordinator) = coordinator_id {
            ensure_people_exist(self.person_repo.as_ref(), [&coordinator]).await?;
        }
        if let Some(branch) = branch_id {
            if self.branch_repo.find_by_id(branch).await?.is_none() {
                return Err(AppError::Validation(format!("Unknown branch: {}", branch)));
            }
        }
        if let Some(members) = members {
            ensure_people_exist(self.person_repo.as_ref(), members).await?;
        }
        for family in families.unwrap_or_default() {
            if self.family_repo.find_by_id(*family).await?.is_none() {
                return Err(AppError::Validation(format!("Unknown family: {}", family)));
            }
        }
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, owner: Option<Uuid>) -> Result<()> {
        if let Some(existing) = self.repo.find_by_code(code).await? {
            if Some(existing.id) != owner {
                return Err(AppError::Conflict(format!("Cluster code {} already exists", code)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CrudService for ClusterService {
    type Item = Cluster;
    type Create = CreateClusterRequest;
    type Update = UpdateClusterRequest;

    const ENTITY: &'static str = "cluster";

    fn from_context(context: &ServiceContext) -> &Self {
        &context.cluster_service
    }

    async fn list_all(&self) -> Result<Vec<Cluster>> {
        self.repo.list_all().await
    }

    async fn get(&self, id: Uuid) -> Result<Cluster> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cluster not found".to_string()))
    }

    async fn create(&self, actor: &Actor, request: CreateClusterRequest) -> Result<Cluster> {
        request.validate()?;
        self.ensure_code_free(&request.code, None).await?;
        self.check_references(
            request.coordinator_id,
            request.branch_id,
            Some(request.members.as_slice()),
            Some(request.families.as_slice()),
        )
        .await?;

        let cluster = self.repo.create(request).await?;
        tracing::info!("Created cluster {} ({})", cluster.code, cluster.id);
        self.audit
            .record(
                NewAuditEntry::new(actor, "create", Self::ENTITY, Some(cluster.id))
                    .with_details(cluster.name.clone()),
            )
            .await;
        Ok(cluster)
    }

    async fn update(&self, actor: &Actor, id: Uuid, request: UpdateClusterRequest) -> Result<Cluster> {
        request.validate()?;
        self.get(id).await?;
        if let Some(code) = request.code.as_deref() {
            self.ensure_code_free(code, Some(id)).await?;
        }
        self.check_references(
            request.coordinator_id.flatten(),
            request.branch_id.flatten(),
            request.members.as_deref(),
            request.families.as_deref(),
        )
        .await?;

        let details = match (&request.members, &request.families) {
            (Some(m), Some(f)) => Some(format!("{} members, {} families", m.len(), f.len())),
            (Some(m), None) => Some(format!("{} members", m.len())),
            (None, Some(f)) => Some(format!("{} families", f.len())),
            (None, None) => None,
        };

        let cluster = self.repo.update(id, request).await?;
        let mut entry = NewAuditEntry::new(actor, "update", Self::ENTITY, Some(id));
        if let Some(details) = details {
            entry = entry.with_details(details);
        }
        self.audit.record(entry).await;
        Ok(cluster)
    }

    async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let cluster = self.get(id).await?;
        self.repo.delete(id).await?;
        tracing::info!("Deleted cluster {} ({})", cluster.code, id);
        self.audit
            .record(
                NewAuditEntry::new(actor, "delete", Self::ENTITY, Some(id))
                    .with_details(cluster.name),
            )
            .await;
        Ok(())
    }
}
