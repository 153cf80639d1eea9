use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{generate_temporary_password, AuthService},
    config::{AuthConfig, LockoutMode},
    domain::*,
    error::{AppError, Result},
    repository::{LockedAccountRepository, PasswordResetRepository, PersonRepository},
};

/// A successful sign-in: who, and the raw session token to hand back.
pub struct LoginOutcome {
    pub person: Person,
    pub token: String,
}

/// Sign-in with lockout, password-reset requests and account unlocking.
pub struct AccountService {
    person_repo: Arc<dyn PersonRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    lock_repo: Arc<dyn LockedAccountRepository>,
    auth: Arc<AuthService>,
    audit: Arc<super::AuditService>,
    config: AuthConfig,
}

impl AccountService {
    pub fn new(
        person_repo: Arc<dyn PersonRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        lock_repo: Arc<dyn LockedAccountRepository>,
        auth: Arc<AuthService>,
        audit: Arc<super::AuditService>,
        config: AuthConfig,
    ) -> Self {
        Self {
            person_repo,
            reset_repo,
            lock_repo,
            auth,
            audit,
            config,
        }
    }

    pub fn session_hours(&self) -> i64 {
        self.config.session_duration_hours
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let person = self
            .person_repo
            .find_by_username(username.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        let now = Utc::now();
        if let Some(lock) = self.lock_repo.find_active(person.id, now).await? {
            return Err(AppError::Locked(lock_message(&lock)));
        }

        let Some(hash) = self.person_repo.password_hash(person.id).await? else {
            return Err(AppError::Unauthorized);
        };

        if !AuthService::verify_password(password, &hash).await? {
            let attempts = self.person_repo.record_failed_login(person.id).await?;
            tracing::warn!("Failed login for {} ({} consecutive)", person.username, attempts);

            if attempts >= self.config.max_failed_attempts {
                let lock = self.lock(&person, attempts).await?;
                return Err(AppError::Locked(lock_message(&lock)));
            }
            return Err(AppError::Unauthorized);
        }

        self.person_repo.reset_failed_logins(person.id).await?;
        let (_session, token) = self
            .auth
            .create_session(person.id, self.config.session_duration_hours)
            .await?;

        tracing::info!("{} signed in", person.username);
        self.audit
            .record(NewAuditEntry::new(&Actor::from(&person), "login", "person", Some(person.id)))
            .await;

        Ok(LoginOutcome { person, token })
    }

    async fn lock(&self, person: &Person, attempts: i64) -> Result<LockedAccount> {
        let locked_until = match self.config.lockout_mode {
            LockoutMode::Timed => Some(Utc::now() + Duration::minutes(self.config.lockout_minutes)),
            LockoutMode::Manual => None,
        };
        let reason = format!("{} consecutive failed sign-in attempts", attempts);
        let lock = self
            .lock_repo
            .create(person, attempts, locked_until, &reason)
            .await?;
        self.person_repo.reset_failed_logins(person.id).await?;

        tracing::warn!("Locked account {} until {:?}", person.username, locked_until);
        self.audit
            .record(
                NewAuditEntry::new(&Actor::anonymous(), "lock", "person", Some(person.id))
                    .with_details(reason),
            )
            .await;
        Ok(lock)
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.auth.invalidate_session(token).await
    }

    /// File a reset request. Unknown usernames are accepted silently so the
    /// endpoint does not reveal which accounts exist.
    pub async fn request_reset(
        &self,
        request: SubmitResetRequest,
    ) -> Result<Option<PasswordResetRequest>> {
        let Some(person) = self.person_repo.find_by_username(request.username.trim()).await? else {
            tracing::info!("Password reset requested for unknown user {}", request.username);
            return Ok(None);
        };

        if let Some(pending) = self.reset_repo.find_pending_for(person.id).await? {
            return Ok(Some(pending));
        }

        let reset = self
            .reset_repo
            .create(person.id, &person.username, request.reason)
            .await?;
        self.audit
            .record(NewAuditEntry::new(
                &Actor::from(&person),
                "request_password_reset",
                "password_reset",
                Some(reset.id),
            ))
            .await;
        Ok(Some(reset))
    }

    async fn pending_reset(&self, id: Uuid) -> Result<PasswordResetRequest> {
        let reset = self
            .reset_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reset request not found".to_string()))?;
        if reset.status != ResetStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Reset request is already {}",
                reset.status.as_str().to_lowercase()
            )));
        }
        Ok(reset)
    }

    /// Approve: set a temporary password, sign the person out everywhere and
    /// clear any lock. The password is only ever returned here.
    pub async fn approve_reset(
        &self,
        actor: &Actor,
        id: Uuid,
        process: ProcessResetRequest,
    ) -> Result<ApprovedReset> {
        let reset = self.pending_reset(id).await?;

        let temporary_password = generate_temporary_password(self.config.temp_password_length);
        let hash = AuthService::hash_password(&temporary_password).await?;
        self.person_repo.set_password_hash(reset.person_id, &hash).await?;
        self.person_repo.reset_failed_logins(reset.person_id).await?;
        self.auth.invalidate_person_sessions(reset.person_id).await?;

        while let Some(lock) = self.lock_repo.find_active(reset.person_id, Utc::now()).await? {
            self.lock_repo.unlock(lock.id, actor.id).await?;
        }

        let request = self
            .reset_repo
            .mark_processed(id, ResetStatus::Approved, actor.id, process.admin_notes)
            .await?;

        tracing::info!("Approved password reset for {}", request.username);
        self.audit
            .record(
                NewAuditEntry::new(actor, "approve", "password_reset", Some(id))
                    .with_details(request.username.clone()),
            )
            .await;

        Ok(ApprovedReset {
            request,
            temporary_password,
        })
    }

    pub async fn reject_reset(
        &self,
        actor: &Actor,
        id: Uuid,
        process: ProcessResetRequest,
    ) -> Result<PasswordResetRequest> {
        self.pending_reset(id).await?;
        let request = self
            .reset_repo
            .mark_processed(id, ResetStatus::Rejected, actor.id, process.admin_notes)
            .await?;

        self.audit
            .record(
                NewAuditEntry::new(actor, "reject", "password_reset", Some(id))
                    .with_details(request.username.clone()),
            )
            .await;
        Ok(request)
    }

    pub async fn list_resets(&self) -> Result<Vec<PasswordResetRequest>> {
        self.reset_repo.list_all().await
    }

    pub async fn list_locks(&self) -> Result<Vec<LockedAccount>> {
        self.lock_repo.list_all().await
    }

    pub async fn unlock(&self, actor: &Actor, lock_id: Uuid) -> Result<LockedAccount> {
        let lock = self.lock_repo.unlock(lock_id, actor.id).await?;
        self.person_repo.reset_failed_logins(lock.person_id).await?;

        tracing::info!("Unlocked account {}", lock.username);
        self.audit
            .record(
                NewAuditEntry::new(actor, "unlock", "locked_account", Some(lock.id))
                    .with_details(lock.username.clone()),
            )
            .await;
        Ok(lock)
    }

    /// Create the first administrator. Refused once any administrator exists.
    pub async fn setup_admin(&self, mut request: CreatePersonRequest) -> Result<Person> {
        if self.person_repo.count_by_role(Role::Admin).await? > 0 {
            return Err(AppError::Conflict("Setup has already been completed".to_string()));
        }
        request.validate()?;
        if request.password.is_none() {
            return Err(AppError::Validation("password is required".to_string()));
        }
        if request.username.is_none() {
            return Err(AppError::Validation("username is required".to_string()));
        }
        request.role = Role::Admin;
        request.status = PersonStatus::Active;

        let person = self.person_repo.create(request).await?;
        tracing::info!("Created initial administrator {}", person.username);
        self.audit
            .record(NewAuditEntry::new(&Actor::system("setup"), "create", "person", Some(person.id)))
            .await;
        Ok(person)
    }

    pub async fn needs_setup(&self) -> Result<bool> {
        Ok(self.person_repo.count_by_role(Role::Admin).await? == 0)
    }
}

fn lock_message(lock: &LockedAccount) -> String {
    match lock.locked_until {
        Some(until) => format!(
            "Account is locked until {}",
            until.format("%Y-%m-%d %H:%M UTC")
        ),
        None => "Account is locked. Contact an administrator to unlock it".to_string(),
    }
}
