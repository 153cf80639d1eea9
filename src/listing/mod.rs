//! In-memory list pipeline shared by every collection endpoint.
//!
//! A [`ListQuery`] is applied to a full collection in four steps: free-text
//! search, structured filters (all must match), a stable single-field sort,
//! and finally a page slice. The input slice is never modified.

pub mod filter;
pub mod selection;
pub mod sort;
pub mod state;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::ListingConfig,
    error::{AppError, Result},
};

pub use filter::{FilterCondition, FilterOperator, FilterValue, Scalar};
pub use selection::Selection;
pub use sort::{SortDirection, SortSpec};
pub use state::{FetchTicket, ListState};

/// Query-string keys with a fixed meaning. Any other key is an `is` filter.
const RESERVED_PARAMS: &[&str] = &["page", "page_size", "search", "sort", "order", "filters"];

/// A record field as seen by search, filters and sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bool(bool),
    Null,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Null, |v| FieldValue::Text(v.to_string()))
    }

    pub fn opt_date(value: Option<NaiveDate>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Date)
    }

    pub fn opt_timestamp(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Timestamp)
    }

    pub fn opt_uuid(value: Option<Uuid>) -> Self {
        value.map_or(FieldValue::Null, |v| FieldValue::Text(v.to_string()))
    }

    /// Lower-cased textual form, used by search and the substring operators.
    pub fn search_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.to_lowercase()),
            FieldValue::Number(n) => Some(format_number(*n)),
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            FieldValue::Timestamp(t) => Some(t.format("%Y-%m-%d %H:%M").to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Null => None,
        }
    }

    /// Plain textual form for exports.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Timestamp(t) => t.format("%Y-%m-%d %H:%M").to_string(),
            FieldValue::Bool(true) => "Yes".to_string(),
            FieldValue::Bool(false) => "No".to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A record that can be searched, filtered, sorted and exported.
pub trait Listable {
    /// Field names accepted by filters, sorting and export projections.
    const FIELDS: &'static [&'static str];
    /// Fields free-text search looks at.
    const SEARCH_FIELDS: &'static [&'static str];
    /// Sort applied when the query names none.
    const DEFAULT_SORT: &'static str;

    fn id(&self) -> Uuid;
    fn field(&self, name: &str) -> FieldValue;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(1, ListingConfig::default().default_page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

impl<T: Listable> Page<T> {
    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().map(Listable::id).collect()
    }
}

impl ListQuery {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            search: None,
            filters: Vec::new(),
            sort: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec::new(field, direction));
        self
    }

    /// Parse the wire form: `page`, `page_size`, `search`, `sort`, `order`,
    /// `filters` (a JSON array of conditions) and any other key as an `is`
    /// filter on that field.
    pub fn from_params(params: &HashMap<String, String>, config: &ListingConfig) -> Result<Self> {
        let page = match params.get("page") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| AppError::BadRequest(format!("Invalid page: {}", raw)))?,
            None => 1,
        };
        let page_size = match params.get("page_size") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| AppError::BadRequest(format!("Invalid page_size: {}", raw)))?,
            None => config.default_page_size,
        };

        let search = params
            .get("search")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut filters: Vec<FilterCondition> = match params.get("filters") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
                .map_err(|e| AppError::BadRequest(format!("Invalid filters: {}", e)))?,
            _ => Vec::new(),
        };

        let mut extra: Vec<(&String, &String)> = params
            .iter()
            .filter(|(k, v)| !RESERVED_PARAMS.contains(&k.as_str()) && !v.trim().is_empty())
            .collect();
        // HashMap order is arbitrary; keep filter order reproducible.
        extra.sort();
        for (field, value) in extra {
            filters.push(FilterCondition::new(
                field.clone(),
                FilterOperator::Is,
                FilterValue::Single(Scalar::Text(value.trim().to_string())),
            ));
        }

        let sort = match params.get("sort").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(field) => {
                let direction = match params.get("order") {
                    Some(order) => SortDirection::parse(order).ok_or_else(|| {
                        AppError::BadRequest(format!("Invalid sort order: {}", order))
                    })?,
                    None => SortDirection::Asc,
                };
                Some(SortSpec::new(field, direction))
            }
            None => None,
        };

        Ok(Self {
            page: page.max(1),
            page_size: page_size.clamp(1, config.max_page_size.max(1)),
            search,
            filters,
            sort,
        })
    }

    /// Inverse of [`ListQuery::from_params`], used by the API client.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search".to_string(), search.to_string()));
        }
        if !self.filters.is_empty() {
            // Serializing plain enums and strings cannot fail.
            if let Ok(encoded) = serde_json::to_string(&self.filters) {
                params.push(("filters".to_string(), encoded));
            }
        }
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.field.clone()));
            params.push(("order".to_string(), sort.direction.as_str().to_string()));
        }
        params
    }

    /// Reject field names the record type does not expose.
    pub fn validate_for<T: Listable>(&self) -> Result<()> {
        for condition in &self.filters {
            if !T::FIELDS.contains(&condition.field.as_str()) {
                return Err(AppError::BadRequest(format!(
                    "Unknown filter field: {}",
                    condition.field
                )));
            }
            condition.validate()?;
        }
        if let Some(sort) = &self.sort {
            if !T::FIELDS.contains(&sort.field.as_str()) {
                return Err(AppError::BadRequest(format!("Unknown sort field: {}", sort.field)));
            }
        }
        Ok(())
    }

    pub fn matches_search<T: Listable>(&self, item: &T) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return true,
        };
        T::SEARCH_FIELDS.iter().any(|name| {
            item.field(name)
                .search_text()
                .map(|text| text.contains(&needle))
                .unwrap_or(false)
        })
    }

    pub fn matches<T: Listable>(&self, item: &T) -> bool {
        self.matches_search(item)
            && self
                .filters
                .iter()
                .all(|condition| condition.matches(&item.field(&condition.field)))
    }

    /// Every matching record, sorted, without paging. Used by exports of a
    /// whole filtered list.
    pub fn select_all<'a, T: Listable>(&self, items: &'a [T]) -> Vec<&'a T> {
        let mut matched: Vec<&T> = items.iter().filter(|item| self.matches(*item)).collect();
        let sort = self
            .sort
            .clone()
            .unwrap_or_else(|| SortSpec::new(T::DEFAULT_SORT, SortDirection::Asc));
        // `sort_by` is stable: ties keep their original order.
        matched.sort_by(|a, b| sort.compare(*a, *b));
        matched
    }

    pub fn apply<T: Listable + Clone>(&self, items: &[T]) -> Page<T> {
        let matched = self.select_all(items);
        let page_size = self.page_size.max(1);
        let page = self.page.max(1);
        let total = matched.len();
        let total_pages = total.div_ceil(page_size);
        let start = (page - 1).saturating_mul(page_size);

        let items = matched
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();

        Page {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}
