use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::FieldValue;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Contains,
    Is,
    IsNot,
    StartsWith,
    EndsWith,
    Between,
    GreaterThan,
    LessThan,
}

/// One literal in a filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Scalar::Number(_) => None,
        }
    }

    fn lower(&self) -> String {
        match self {
            Scalar::Text(s) => s.trim().to_lowercase(),
            Scalar::Number(n) => super::format_number(*n),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// A single value, or an inclusive `[low, high]` range for `between`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range([Scalar; 2]),
    Single(Scalar),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// `between` takes a range; every other operator takes a single value.
    pub fn validate(&self) -> Result<()> {
        match (self.operator, &self.value) {
            (FilterOperator::Between, FilterValue::Range(_)) => Ok(()),
            (FilterOperator::Between, FilterValue::Single(_)) => Err(AppError::BadRequest(format!(
                "Filter on {} uses between without a [low, high] range",
                self.field
            ))),
            (_, FilterValue::Range(_)) => Err(AppError::BadRequest(format!(
                "Filter on {} takes a single value",
                self.field
            ))),
            (_, FilterValue::Single(_)) => Ok(()),
        }
    }

    pub fn matches(&self, actual: &FieldValue) -> bool {
        let value = match (&self.value, self.operator) {
            (FilterValue::Range([low, high]), FilterOperator::Between) => {
                return matches!(compare(actual, low), Some(Ordering::Equal | Ordering::Greater))
                    && matches!(compare(actual, high), Some(Ordering::Equal | Ordering::Less));
            }
            (FilterValue::Single(value), op) if op != FilterOperator::Between => value,
            _ => return false,
        };

        match self.operator {
            FilterOperator::Contains => substring(actual, value, |hay, needle| hay.contains(needle)),
            FilterOperator::StartsWith => {
                substring(actual, value, |hay, needle| hay.starts_with(needle))
            }
            FilterOperator::EndsWith => substring(actual, value, |hay, needle| hay.ends_with(needle)),
            FilterOperator::Is => equals(actual, value),
            FilterOperator::IsNot => !equals(actual, value),
            FilterOperator::GreaterThan => compare(actual, value) == Some(Ordering::Greater),
            FilterOperator::LessThan => compare(actual, value) == Some(Ordering::Less),
            FilterOperator::Between => false,
        }
    }
}

fn substring(actual: &FieldValue, value: &Scalar, op: impl Fn(&str, &str) -> bool) -> bool {
    actual
        .search_text()
        .map(|hay| op(&hay, &value.lower()))
        .unwrap_or(false)
}

fn equals(actual: &FieldValue, value: &Scalar) -> bool {
    match actual {
        FieldValue::Text(s) => s.trim().to_lowercase() == value.lower(),
        FieldValue::Null => false,
        _ => compare(actual, value) == Some(Ordering::Equal),
    }
}

/// Order `actual` against a filter literal. `None` when the two cannot be
/// compared (missing value, unparsable literal).
fn compare(actual: &FieldValue, value: &Scalar) -> Option<Ordering> {
    match actual {
        FieldValue::Number(n) => value.as_number().and_then(|v| n.partial_cmp(&v)),
        FieldValue::Date(d) => value.as_date().map(|v| d.cmp(&v)),
        // A plain date literal compares against the calendar day.
        FieldValue::Timestamp(t) => match value {
            Scalar::Text(s) => match DateTime::parse_from_rfc3339(s.trim()) {
                Ok(v) => Some(t.cmp(&v.with_timezone(&Utc))),
                Err(_) => value.as_date().map(|v| t.date_naive().cmp(&v)),
            },
            _ => None,
        },
        FieldValue::Bool(b) => value.as_bool().map(|v| b.cmp(&v)),
        FieldValue::Text(s) => match (s.trim().parse::<f64>(), value.as_number()) {
            (Ok(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(s.to_lowercase().as_str().cmp(value.lower().as_str())),
        },
        FieldValue::Null => None,
    }
}
