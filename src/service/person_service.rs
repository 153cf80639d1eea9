use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{BranchRepository, PersonRepository},
    service::{AuditService, CrudService, ServiceContext},
};

#[derive(Clone)]
pub struct PersonService {
    repo: Arc<dyn PersonRepository>,
    branch_repo: Arc<dyn BranchRepository>,
    audit: Arc<AuditService>,
}

impl PersonService {
    pub fn new(
        repo: Arc<dyn PersonRepository>,
        branch_repo: Arc<dyn BranchRepository>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repo,
            branch_repo,
            audit,
        }
    }

    async fn ensure_branch(&self, branch_id: Option<Uuid>) -> Result<()> {
        if let Some(id) = branch_id {
            if self.branch_repo.find_by_id(id).await?.is_none() {
                return Err(AppError::Validation(format!("Unknown branch: {}", id)));
            }
        }
        Ok(())
    }

    async fn ensure_member_id_free(&self, member_id: Option<&str>, owner: Option<Uuid>) -> Result<()> {
        let Some(member_id) = member_id.map(str::trim).filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        if let Some(existing) = self.repo.find_by_member_id(member_id).await? {
            if Some(existing.id) != owner {
                return Err(AppError::Conflict(format!(
                    "Member ID {} is already assigned to {}",
                    member_id,
                    existing.full_name()
                )));
            }
        }
        Ok(())
    }

    /// Pick `first.last`, adding a counter until nobody holds it.
    async fn derive_username(&self, first_name: &str, last_name: &str) -> Result<String> {
        let base = username_base(first_name, last_name);
        if self.repo.find_by_username(&base).await?.is_none() {
            return Ok(base);
        }
        for n in 2..10_000 {
            let candidate = format!("{}{}", base, n);
            if self.repo.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::Conflict(format!("No free username for {}", base)))
    }

    /// Create without validation or duplicate checks on the request shape;
    /// callers that already validated (CSV import) use this.
    pub(crate) async fn create_checked(&self, actor: &Actor, mut request: CreatePersonRequest) -> Result<Person> {
        ensure_may_grant(actor, None, Some(request.role), request.password.is_some())?;
        request.member_id = request
            .member_id
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        self.ensure_member_id_free(request.member_id.as_deref(), None).await?;
        self.ensure_branch(request.branch_id).await?;

        if let Some(email) = request.email.as_deref() {
            if self.repo.find_by_email(email).await?.is_some() {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        request.username = match request.username.take() {
            Some(username) => {
                if self.repo.find_by_username(&username).await?.is_some() {
                    return Err(AppError::Conflict("Username already exists".to_string()));
                }
                Some(username)
            }
            None => Some(
                self.derive_username(&request.first_name, &request.last_name)
                    .await?,
            ),
        };

        let person = self.repo.create(request).await?;
        tracing::info!("Created person {} ({})", person.username, person.id);

        self.audit
            .record(
                NewAuditEntry::new(actor, "create", Self::ENTITY, Some(person.id))
                    .with_details(person.full_name()),
            )
            .await;

        Ok(person)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Person>> {
        self.repo.find_by_username(username).await
    }
}

/// Only administrators set passwords or move anyone into or out of the
/// administrator role.
fn ensure_may_grant(
    actor: &Actor,
    current: Option<Role>,
    requested: Option<Role>,
    sets_password: bool,
) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }
    let touches_admin = match requested {
        Some(role) if Some(role) != current => {
            role == Role::Admin || current == Some(Role::Admin)
        }
        _ => false,
    };
    if sets_password || touches_admin {
        tracing::warn!(
            "Refused role or password change by {}",
            actor.username.as_deref().unwrap_or("anonymous")
        );
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn username_base(first_name: &str, last_name: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    };
    let first = clean(first_name);
    let last = clean(last_name);
    let base = match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{}.{}", first, last),
        (false, true) => first,
        (true, false) => last,
        (true, true) => "person".to_string(),
    };
    if base.len() < 3 {
        format!("{}.user", base)
    } else {
        base
    }
}

#[async_trait]
impl CrudService for PersonService {
    type Item = Person;
    type Create = CreatePersonRequest;
    type Update = UpdatePersonRequest;

    const ENTITY: &'static str = "person";

    fn from_context(context: &ServiceContext) -> &Self {
        &context.person_service
    }

    async fn list_all(&self) -> Result<Vec<Person>> {
        self.repo.list_all().await
    }

    async fn get(&self, id: Uuid) -> Result<Person> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Person not found".to_string()))
    }

    async fn create(&self, actor: &Actor, request: CreatePersonRequest) -> Result<Person> {
        request.validate()?;
        self.create_checked(actor, request).await
    }

    async fn update(&self, actor: &Actor, id: Uuid, mut request: UpdatePersonRequest) -> Result<Person> {
        request.validate()?;
        let existing = self.get(id).await?;
        ensure_may_grant(actor, Some(existing.role), request.role, false)?;

        // A blank member ID clears it
        request.member_id = request.member_id.map(|m| {
            m.map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
        });
        self.ensure_member_id_free(request.member_id.as_ref().and_then(Option::as_deref), Some(id))
            .await?;
        self.ensure_branch(request.branch_id.flatten()).await?;

        let person = self.repo.update(id, request).await?;
        self.audit
            .record(NewAuditEntry::new(actor, "update", Self::ENTITY, Some(id)))
            .await;
        Ok(person)
    }

    async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        if actor.id == Some(id) {
            return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
        }
        let person = self.get(id).await?;
        self.repo.delete(id).await?;
        tracing::info!("Deleted person {} ({})", person.username, id);

        self.audit
            .record(
                NewAuditEntry::new(actor, "delete", Self::ENTITY, Some(id))
                    .with_details(person.full_name()),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> Actor {
        Actor {
            id: Some(Uuid::new_v4()),
            username: Some("coord.lim".to_string()),
            role: Some(Role::Coordinator),
        }
    }

    #[test]
    fn test_only_admins_grant_admin_or_passwords() {
        let staff = coordinator();
        assert!(ensure_may_grant(&staff, None, Some(Role::Member), false).is_ok());
        assert!(ensure_may_grant(&staff, Some(Role::Member), Some(Role::Pastor), false).is_ok());
        assert!(ensure_may_grant(&staff, Some(Role::Admin), Some(Role::Admin), false).is_ok());

        assert!(matches!(
            ensure_may_grant(&staff, None, Some(Role::Admin), false),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_may_grant(&staff, Some(Role::Coordinator), Some(Role::Admin), false),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_may_grant(&staff, Some(Role::Admin), Some(Role::Member), false),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_may_grant(&staff, None, Some(Role::Member), true),
            Err(AppError::Forbidden)
        ));

        let seed = Actor::system("seed");
        assert!(ensure_may_grant(&seed, None, Some(Role::Admin), true).is_ok());
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("John", "Doe"), "john.doe");
        assert_eq!(username_base("Mary Ann", "O'Neil"), "maryann.oneil");
        assert_eq!(username_base("Al", ""), "al.user");
        assert_eq!(username_base("", ""), "person");
    }
}
