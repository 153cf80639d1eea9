use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::listing::{FieldValue, Listable};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    /// At most one branch carries this flag.
    pub is_headquarters: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_headquarters: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateBranchRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_headquarters: Option<bool>,
}

impl Listable for Branch {
    const FIELDS: &'static [&'static str] = &[
        "code",
        "name",
        "address",
        "is_active",
        "is_headquarters",
        "created_at",
        "updated_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["code", "name", "address"];
    const DEFAULT_SORT: &'static str = "name";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "code" => FieldValue::text(&self.code),
            "name" => FieldValue::text(&self.name),
            "address" => FieldValue::opt_text(self.address.as_deref()),
            "is_active" => FieldValue::Bool(self.is_active),
            "is_headquarters" => FieldValue::Bool(self.is_headquarters),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Null,
        }
    }
}
