use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::BranchRepository,
    service::{AuditService, CrudService, ServiceContext},
};

pub struct BranchService {
    repo: Arc<dyn BranchRepository>,
    audit: Arc<AuditService>,
}

impl BranchService {
    pub fn new(repo: Arc<dyn BranchRepository>, audit: Arc<AuditService>) -> Self {
        Self { repo, audit }
    }

    async fn ensure_code_free(&self, code: &str, owner: Option<Uuid>) -> Result<()> {
        if let Some(existing) = self.repo.find_by_code(code).await? {
            if Some(existing.id) != owner {
                return Err(AppError::Conflict(format!("Branch code {} already exists", code)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CrudService for BranchService {
    type Item = Branch;
    type Create = CreateBranchRequest;
    type Update = UpdateBranchRequest;

    const ENTITY: &'static str = "branch";

    fn from_context(context: &ServiceContext) -> &Self {
        &context.branch_service
    }

    async fn list_all(&self) -> Result<Vec<Branch>> {
        self.repo.list_all().await
    }

    async fn get(&self, id: Uuid) -> Result<Branch> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Branch not found".to_string()))
    }

    async fn create(&self, actor: &Actor, request: CreateBranchRequest) -> Result<Branch> {
        request.validate()?;
        self.ensure_code_free(&request.code, None).await?;

        let branch = self.repo.create(request).await?;
        tracing::info!("Created branch {} ({})", branch.code, branch.id);
        self.audit
            .record(
                NewAuditEntry::new(actor, "create", Self::ENTITY, Some(branch.id))
                    .with_details(branch.name.clone()),
            )
            .await;
        Ok(branch)
    }

    async fn update(&self, actor: &Actor, id: Uuid, request: UpdateBranchRequest) -> Result<Branch> {
        request.validate()?;
        self.get(id).await?;
        if let Some(code) = request.code.as_deref() {
            self.ensure_code_free(code, Some(id)).await?;
        }

        let branch = self.repo.update(id, request).await?;
        self.audit
            .record(NewAuditEntry::new(actor, "update", Self::ENTITY, Some(id)))
            .await;
        Ok(branch)
    }

    async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let branch = self.get(id).await?;
        self.repo.delete(id).await?;
        tracing::info!("Deleted branch {} ({})", branch.code, id);
        self.audit
            .record(
                NewAuditEntry::new(actor, "delete", Self::ENTITY, Some(id))
                    .with_details(branch.name),
            )
            .await;
        Ok(())
    }
}
