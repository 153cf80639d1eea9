use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{Person, Role},
    listing::{FieldValue, Listable},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResetStatus {
    Pending,
    Approved,
    Rejected,
}

impl ResetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetStatus::Pending => "PENDING",
            ResetStatus::Approved => "APPROVED",
            ResetStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(ResetStatus::Pending),
            "APPROVED" => Some(ResetStatus::Approved),
            "REJECTED" => Some(ResetStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasswordResetRequest {
    pub id: Uuid,
    pub person_id: Uuid,
    pub username: String,
    pub reason: Option<String>,
    pub status: ResetStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResetRequest {
    pub username: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessResetRequest {
    pub admin_notes: Option<String>,
}

/// Returned once to the approving administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedReset {
    pub request: PasswordResetRequest,
    pub temporary_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockedAccount {
    pub id: Uuid,
    pub person_id: Uuid,
    pub username: String,
    pub failed_attempts: i64,
    pub locked_at: DateTime<Utc>,
    /// `None` means the lock only ends by an administrator unlocking it.
    pub locked_until: Option<DateTime<Utc>>,
    pub reason: String,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub unlocked_by: Option<Uuid>,
}

impl LockedAccount {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.unlocked_at.is_none() && self.locked_until.map_or(true, |until| until > now)
    }

    pub fn requires_admin(&self) -> bool {
        self.locked_until.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAuditEntry {
    pub actor_id: Option<Uuid>,
    pub actor_username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<String>,
}

impl NewAuditEntry {
    pub fn new(actor: &Actor, action: &str, entity_type: &str, entity_id: Option<Uuid>) -> Self {
        Self {
            actor_id: actor.id,
            actor_username: actor.username.clone(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Whoever triggered a change. Anonymous for public endpoints and tooling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub role: Option<Role>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Seeding, setup and other tooling act with administrator rights.
    pub fn system(name: &str) -> Self {
        Self {
            id: None,
            username: Some(name.to_string()),
            role: Some(Role::Admin),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

impl From<&Person> for Actor {
    fn from(person: &Person) -> Self {
        Self {
            id: Some(person.id),
            username: Some(person.username.clone()),
            role: Some(person.role),
        }
    }
}

impl Listable for PasswordResetRequest {
    const FIELDS: &'static [&'static str] = &[
        "person_id",
        "username",
        "reason",
        "status",
        "requested_at",
        "processed_at",
        "processed_by",
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["username", "reason", "admin_notes"];
    const DEFAULT_SORT: &'static str = "requested_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "person_id" => FieldValue::text(self.person_id.to_string()),
            "username" => FieldValue::text(&self.username),
            "reason" => FieldValue::opt_text(self.reason.as_deref()),
            "admin_notes" => FieldValue::opt_text(self.admin_notes.as_deref()),
            "status" => FieldValue::text(self.status.as_str()),
            "requested_at" => FieldValue::Timestamp(self.requested_at),
            "processed_at" => FieldValue::opt_timestamp(self.processed_at),
            "processed_by" => FieldValue::opt_uuid(self.processed_by),
            _ => FieldValue::Null,
        }
    }
}

impl Listable for LockedAccount {
    const FIELDS: &'static [&'static str] = &[
        "person_id",
        "username",
        "failed_attempts",
        "locked_at",
        "locked_until",
        "reason",
        "is_locked",
        "unlocked_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["username", "reason"];
    const DEFAULT_SORT: &'static str = "locked_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "person_id" => FieldValue::text(self.person_id.to_string()),
            "username" => FieldValue::text(&self.username),
            "failed_attempts" => FieldValue::Number(self.failed_attempts as f64),
            "locked_at" => FieldValue::Timestamp(self.locked_at),
            "locked_until" => FieldValue::opt_timestamp(self.locked_until),
            "reason" => FieldValue::text(&self.reason),
            "is_locked" => FieldValue::Bool(self.is_active_at(Utc::now())),
            "unlocked_at" => FieldValue::opt_timestamp(self.unlocked_at),
            _ => FieldValue::Null,
        }
    }
}

impl Listable for AuditLog {
    const FIELDS: &'static [&'static str] = &[
        "actor_id",
        "actor_username",
        "action",
        "entity_type",
        "entity_id",
        "details",
        "created_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] =
        &["actor_username", "action", "entity_type", "details"];
    const DEFAULT_SORT: &'static str = "created_at";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "actor_id" => FieldValue::opt_uuid(self.actor_id),
            "actor_username" => FieldValue::opt_text(self.actor_username.as_deref()),
            "action" => FieldValue::text(&self.action),
            "entity_type" => FieldValue::text(&self.entity_type),
            "entity_id" => FieldValue::opt_uuid(self.entity_id),
            "details" => FieldValue::opt_text(self.details.as_deref()),
            "created_at" => FieldValue::Timestamp(self.created_at),
            _ => FieldValue::Null,
        }
    }
}
