//! Bulk delete and export over a selection of records.
//!
//! Deletes run one at a time with no rollback: each id either lands in
//! `deleted` or in `failed` with the reason.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{Actor, NewAuditEntry},
    error::{AppError, Result},
    export::{ExportFile, ExportFormat, Exportable},
    listing::{ListQuery, Listable, Selection},
    service::{AuditService, CrudService},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
    /// The list query of the page the selection was made on. Selected ids
    /// not on that page are skipped.
    #[serde(default)]
    pub visible: Option<ListQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    pub deleted: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
    pub skipped: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    /// Selected ids. Absent means the whole filtered list.
    #[serde(default)]
    pub ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub query: Option<ListQuery>,
    /// Column projection; the record type's defaults when absent.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

/// Split a selection into the ids on the visible page and the rest.
pub fn scope_to_visible<T: Listable + Clone>(
    ids: &[Uuid],
    items: &[T],
    visible: &ListQuery,
) -> (Vec<Uuid>, Vec<Uuid>) {
    let page_ids = visible.apply(items).ids();
    let mut selection = Selection::from_ids(ids.iter().copied());
    selection.retain_visible(&page_ids);
    ids.iter().copied().partition(|id| selection.contains(id))
}

pub async fn bulk_delete<S: CrudService>(
    service: &S,
    audit: &AuditService,
    actor: &Actor,
    request: BulkDeleteRequest,
) -> Result<BulkDeleteResult> {
    if request.ids.is_empty() {
        return Err(AppError::BadRequest("No records selected".to_string()));
    }

    let mut seen = HashSet::new();
    let requested: Vec<Uuid> = request.ids.into_iter().filter(|id| seen.insert(*id)).collect();

    let (targets, skipped) = match &request.visible {
        Some(query) => {
            query.validate_for::<S::Item>()?;
            let items = service.list_all().await?;
            scope_to_visible(&requested, &items, query)
        }
        None => (requested, Vec::new()),
    };

    let mut result = BulkDeleteResult {
        skipped,
        ..Default::default()
    };
    for id in targets {
        match service.delete(actor, id).await {
            Ok(()) => result.deleted.push(id),
            Err(e) => {
                tracing::warn!("Bulk delete of {} {} failed: {}", S::ENTITY, id, e);
                result.failed.push(BulkFailure {
                    id,
                    error: failure_message(&e),
                });
            }
        }
    }

    tracing::info!(
        "Bulk delete of {}: {} deleted, {} failed, {} skipped",
        S::ENTITY,
        result.deleted.len(),
        result.failed.len(),
        result.skipped.len()
    );
    audit
        .record(
            NewAuditEntry::new(actor, "bulk_delete", S::ENTITY, None).with_details(format!(
                "{} deleted, {} failed",
                result.deleted.len(),
                result.failed.len()
            )),
        )
        .await;

    Ok(result)
}

/// Internal causes stay in the log.
fn failure_message(err: &AppError) -> String {
    match err {
        AppError::Database(_) | AppError::Internal(_) | AppError::Export(_) => {
            "Internal error".to_string()
        }
        other => other.to_string(),
    }
}

/// Records an export request covers, in list order.
pub fn select_for_export<'a, T: Listable + Clone>(
    items: &'a [T],
    ids: Option<&[Uuid]>,
    query: Option<&ListQuery>,
) -> Vec<&'a T> {
    let unfiltered = ListQuery::new(1, 1);
    let base = query.unwrap_or(&unfiltered);

    match ids {
        None => base.select_all(items),
        Some(ids) => {
            let wanted: HashSet<Uuid> = match query {
                Some(query) => scope_to_visible(ids, items, query).0.into_iter().collect(),
                None => ids.iter().copied().collect(),
            };
            // Selected rows keep list order even when the query filters them out of `base`.
            let sorter = ListQuery {
                search: None,
                filters: Vec::new(),
                ..base.clone()
            };
            sorter
                .select_all(items)
                .into_iter()
                .filter(|item| wanted.contains(&item.id()))
                .collect()
        }
    }
}

pub async fn export<S: CrudService>(
    service: &S,
    audit: &AuditService,
    actor: &Actor,
    request: ExportRequest,
) -> Result<ExportFile>
where
    S::Item: Exportable,
{
    if let Some(query) = &request.query {
        query.validate_for::<S::Item>()?;
    }
    let items = service.list_all().await?;
    let selected = select_for_export(&items, request.ids.as_deref(), request.query.as_ref());

    let file = crate::export::export_records(&selected, request.format, request.columns.as_deref())?;

    audit
        .record(
            NewAuditEntry::new(actor, "export", S::ENTITY, None).with_details(format!(
                "{} records as {}",
                selected.len(),
                request.format.as_str()
            )),
        )
        .await;
    Ok(file)
}
