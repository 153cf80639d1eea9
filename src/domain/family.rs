use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::listing::{FieldValue, Listable};

/// A household. `members` is replaced as a whole on update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub head_id: Option<Uuid>,
    pub members: Vec<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateFamilyRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub address: Option<String>,
    pub head_id: Option<Uuid>,
    #[serde(default)]
    pub members: Vec<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateFamilyRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub head_id: Option<Option<Uuid>>,
    pub members: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl Listable for Family {
    const FIELDS: &'static [&'static str] =
        &["name", "address", "head_id", "member_count", "created_at", "updated_at"];
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "address"];
    const DEFAULT_SORT: &'static str = "name";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "name" => FieldValue::text(&self.name),
            "address" => FieldValue::opt_text(self.address.as_deref()),
            "head_id" => FieldValue::opt_uuid(self.head_id),
            "member_count" => FieldValue::Number(self.members.len() as f64),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Null,
        }
    }
}
