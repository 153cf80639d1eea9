use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::listing::{FieldValue, Listable};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub member_id: Option<String>,
    pub username: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub status: PersonStatus,
    pub branch_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub date_first_attended: Option<NaiveDate>,
    pub water_baptism_date: Option<NaiveDate>,
    pub spirit_baptism_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = vec![self.first_name.as_str()];
        if let Some(middle) = self.middle_name.as_deref().filter(|m| !m.is_empty()) {
            parts.push(middle);
        }
        parts.push(self.last_name.as_str());
        if let Some(suffix) = self.suffix.as_deref().filter(|s| !s.is_empty()) {
            parts.push(suffix);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Pastor,
    Coordinator,
    Member,
    Visitor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Pastor => "PASTOR",
            Role::Coordinator => "COORDINATOR",
            Role::Member => "MEMBER",
            Role::Visitor => "VISITOR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "PASTOR" => Some(Role::Pastor),
            "COORDINATOR" => Some(Role::Coordinator),
            "MEMBER" => Some(Role::Member),
            "VISITOR" => Some(Role::Visitor),
            _ => None,
        }
    }

    /// Roles allowed into the management console.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Pastor | Role::Coordinator)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonStatus {
    Active,
    Semiactive,
    Inactive,
    Deceased,
    Invited,
    Attended,
}

impl PersonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonStatus::Active => "ACTIVE",
            PersonStatus::Semiactive => "SEMIACTIVE",
            PersonStatus::Inactive => "INACTIVE",
            PersonStatus::Deceased => "DECEASED",
            PersonStatus::Invited => "INVITED",
            PersonStatus::Attended => "ATTENDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace(['-', ' ', '_'], "").as_str() {
            "ACTIVE" => Some(PersonStatus::Active),
            "SEMIACTIVE" => Some(PersonStatus::Semiactive),
            "INACTIVE" => Some(PersonStatus::Inactive),
            "DECEASED" => Some(PersonStatus::Deceased),
            "INVITED" => Some(PersonStatus::Invited),
            "ATTENDED" => Some(PersonStatus::Attended),
            _ => None,
        }
    }
}

fn default_role() -> Role {
    Role::Member
}

fn default_status() -> PersonStatus {
    PersonStatus::Active
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePersonRequest {
    #[validate(length(max = 50))]
    pub member_id: Option<String>,
    /// Derived from the name when absent.
    #[validate(length(min = 3, max = 64))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub middle_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(max = 20))]
    pub suffix: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_status")]
    pub status: PersonStatus,
    pub branch_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub date_first_attended: Option<NaiveDate>,
    pub water_baptism_date: Option<NaiveDate>,
    pub spirit_baptism_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// People without a password cannot sign in.
    #[validate(length(min = 8))]
    pub password: Option<String>,
}

impl CreatePersonRequest {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            member_id: None,
            username: None,
            first_name: first_name.into(),
            middle_name: None,
            last_name: last_name.into(),
            suffix: None,
            email: None,
            phone: None,
            address: None,
            role: default_role(),
            status: default_status(),
            branch_id: None,
            date_of_birth: None,
            date_first_attended: None,
            water_baptism_date: None,
            spirit_baptism_date: None,
            notes: None,
            password: None,
        }
    }
}

/// Partial update. For the doubly optional fields `Some(None)` clears the
/// stored value.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdatePersonRequest {
    #[validate(length(max = 50))]
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub member_id: Option<Option<String>>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<Option<String>>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub suffix: Option<Option<String>>,
    #[validate(email)]
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    pub role: Option<Role>,
    pub status: Option<PersonStatus>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub date_first_attended: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub water_baptism_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub spirit_baptism_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl Listable for Person {
    const FIELDS: &'static [&'static str] = &[
        "member_id",
        "username",
        "first_name",
        "middle_name",
        "last_name",
        "suffix",
        "full_name",
        "email",
        "phone",
        "address",
        "role",
        "status",
        "branch_id",
        "date_of_birth",
        "date_first_attended",
        "water_baptism_date",
        "spirit_baptism_date",
        "created_at",
        "updated_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &[
        "first_name",
        "middle_name",
        "last_name",
        "full_name",
        "username",
        "email",
        "phone",
        "member_id",
    ];
    const DEFAULT_SORT: &'static str = "last_name";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "member_id" => FieldValue::opt_text(self.member_id.as_deref()),
            "username" => FieldValue::text(&self.username),
            "first_name" => FieldValue::text(&self.first_name),
            "middle_name" => FieldValue::opt_text(self.middle_name.as_deref()),
            "last_name" => FieldValue::text(&self.last_name),
            "suffix" => FieldValue::opt_text(self.suffix.as_deref()),
            "full_name" => FieldValue::text(self.full_name()),
            "email" => FieldValue::opt_text(self.email.as_deref()),
            "phone" => FieldValue::opt_text(self.phone.as_deref()),
            "address" => FieldValue::opt_text(self.address.as_deref()),
            "role" => FieldValue::text(self.role.as_str()),
            "status" => FieldValue::text(self.status.as_str()),
            "branch_id" => FieldValue::opt_uuid(self.branch_id),
            "date_of_birth" => FieldValue::opt_date(self.date_of_birth),
            "date_first_attended" => FieldValue::opt_date(self.date_first_attended),
            "water_baptism_date" => FieldValue::opt_date(self.water_baptism_date),
            "spirit_baptism_date" => FieldValue::opt_date(self.spirit_baptism_date),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::Pastor, Role::Coordinator, Role::Member, Role::Visitor] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str(" pastor "), Some(Role::Pastor));
        assert_eq!(Role::from_str("bishop"), None);
        assert!(Role::Coordinator.is_staff());
        assert!(!Role::Member.is_staff());
    }

    #[test]
    fn test_status_accepts_loose_spelling() {
        assert_eq!(PersonStatus::from_str("semi-active"), Some(PersonStatus::Semiactive));
        assert_eq!(PersonStatus::from_str("Semi Active"), Some(PersonStatus::Semiactive));
        assert_eq!(PersonStatus::from_str("attended"), Some(PersonStatus::Attended));
        assert_eq!(PersonStatus::from_str("gone"), None);
    }

    #[test]
    fn test_serde_uses_upper_case() {
        assert_eq!(serde_json::to_string(&Role::Coordinator).unwrap(), "\"COORDINATOR\"");
        assert_eq!(
            serde_json::from_str::<PersonStatus>("\"SEMIACTIVE\"").unwrap(),
            PersonStatus::Semiactive
        );
    }
}
