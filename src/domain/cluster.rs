use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::listing::{FieldValue, Listable};

/// A small group. `members` and `families` are ID rosters that are always
/// replaced wholesale, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub meeting_schedule: Option<String>,
    pub coordinator_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub members: Vec<Uuid>,
    pub families: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateClusterRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub meeting_schedule: Option<String>,
    pub coordinator_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub members: Vec<Uuid>,
    #[serde(default)]
    pub families: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateClusterRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub meeting_schedule: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub coordinator_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Option<Uuid>>,
    pub members: Option<Vec<Uuid>>,
    pub families: Option<Vec<Uuid>>,
}

impl Listable for Cluster {
    const FIELDS: &'static [&'static str] = &[
        "code",
        "name",
        "description",
        "location",
        "meeting_schedule",
        "coordinator_id",
        "branch_id",
        "member_count",
        "family_count",
        "created_at",
        "updated_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] =
        &["code", "name", "description", "location", "meeting_schedule"];
    const DEFAULT_SORT: &'static str = "name";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "code" => FieldValue::text(&self.code),
            "name" => FieldValue::text(&self.name),
            "description" => FieldValue::opt_text(self.description.as_deref()),
            "location" => FieldValue::opt_text(self.location.as_deref()),
            "meeting_schedule" => FieldValue::opt_text(self.meeting_schedule.as_deref()),
            "coordinator_id" => FieldValue::opt_uuid(self.coordinator_id),
            "branch_id" => FieldValue::opt_uuid(self.branch_id),
            "member_count" => FieldValue::Number(self.member_count() as f64),
            "family_count" => FieldValue::Number(self.family_count() as f64),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Null,
        }
    }
}
