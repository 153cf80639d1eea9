use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{FamilyRepository, PersonRepository},
    service::{AuditService, CrudService, ServiceContext},
};

pub struct FamilyService {
    repo: Arc<dyn FamilyRepository>,
    person_repo: Arc<dyn PersonRepository>,
    audit: Arc<AuditService>,
}

impl FamilyService {
    pub fn new(
        repo: Arc<dyn FamilyRepository>,
        person_repo: Arc<dyn PersonRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repo,
            person_repo,
            audit,
        }
    }
}

/// Every id must name an existing person.
pub(crate) async fn ensure_people_exist<'a>(
    repo: &dyn PersonRepository,
    ids: impl IntoIterator<Item = &'a Uuid>,
) -> Result<()> {
    for id in ids {
        if repo.find_by_id(*id).await?.is_none() {
            return Err(AppError::Validation(format!("Unknown person: {}", id)));
        }
    }
    Ok(())
}

/// The head of a family is always one of its members.
fn with_head(mut members: Vec<Uuid>, head_id: Option<Uuid>) -> Vec<Uuid> {
    if let Some(head) = head_id {
        if !members.contains(&head) {
            members.insert(0, head);
        }
    }
    members
}

#[async_trait]
impl CrudService for FamilyService {
    type Item = Family;
    type Create = CreateFamilyRequest;
    type Update = UpdateFamilyRequest;

    const ENTITY: &'static str = "family";

    fn from_context(context: &ServiceContext) -> &Self {
        &context.family_service
    }

    async fn list_all(&self) -> Result<Vec<Family>> {
        self.repo.list_all().await
    }

    async fn get(&self, id: Uuid) -> Result<Family> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Family not found".to_string()))
    }

    async fn create(&self, actor: &Actor, mut request: CreateFamilyRequest) -> Result<Family> {
        request.validate()?;
        request.members = with_head(request.members, request.head_id);
        ensure_people_exist(self.person_repo.as_ref(), &request.members).await?;

        let family = self.repo.create(request).await?;
        tracing::info!("Created family {} ({})", family.name, family.id);
        self.audit
            .record(
                NewAuditEntry::new(actor, "create", Self::ENTITY, Some(family.id))
                    .with_details(family.name.clone()),
            )
            .await;
        Ok(family)
    }

    async fn update(&self, actor: &Actor, id: Uuid, mut request: UpdateFamilyRequest) -> Result<Family> {
        request.validate()?;
        let existing = self.get(id).await?;

        if request.members.is_some() || request.head_id.is_some() {
            let members = request.members.take().unwrap_or(existing.members);
            let members = with_head(members, request.head_id.unwrap_or(existing.head_id));
            ensure_people_exist(self.person_repo.as_ref(), &members).await?;
            request.members = Some(members);
        }

        let family = self.repo.update(id, request).await?;
        self.audit
            .record(NewAuditEntry::new(actor, "update", Self::ENTITY, Some(id)))
            .await;
        Ok(family)
    }

    async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let family = self.get(id).await?;
        self.repo.delete(id).await?;
        tracing::info!("Deleted family {} ({})", family.name, id);
        self.audit
            .record(
                NewAuditEntry::new(actor, "delete", Self::ENTITY, Some(id))
                    .with_details(family.name),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_joins_members_once() {
        let head = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(with_head(vec![other], Some(head)), vec![head, other]);
        assert_eq!(with_head(vec![other, head], Some(head)), vec![other, head]);
        assert_eq!(with_head(vec![other], None), vec![other]);
    }
}
