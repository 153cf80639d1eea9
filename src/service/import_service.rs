use std::sync::Arc;

use crate::{
    config::ImportConfig,
    domain::{Actor, NewAuditEntry},
    error::{AppError, Result},
    import::{self, ImportFailure, ImportPreview, ImportResult},
    service::{AuditService, PersonService},
};

pub struct ImportService {
    people: PersonService,
    audit: Arc<AuditService>,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(people: PersonService, audit: Arc<AuditService>, config: ImportConfig) -> Self {
        Self {
            people,
            audit,
            config,
        }
    }

    pub fn preview(&self, csv: &str) -> Result<ImportPreview> {
        import::preview(csv, &self.config)
    }

    /// Re-validate and create people one row at a time. Rows that fail (an
    /// email or member ID already on file, say) are reported without
    /// stopping the rest.
    pub async fn import(&self, actor: &Actor, csv: &str) -> Result<ImportResult> {
        let preview = self.preview(csv)?;

        if preview.rows.is_empty() && preview.errors.is_empty() {
            return Err(AppError::BadRequest("CSV has no data rows".to_string()));
        }
        if !preview.duplicates.is_empty() {
            return Err(AppError::Conflict(format!(
                "Import blocked: {} duplicate rows",
                preview.duplicates.count()
            )));
        }
        if !preview.errors.is_empty() {
            return Err(AppError::Validation(format!(
                "Import blocked: {} rows have errors",
                preview.errors.len()
            )));
        }

        let mut result = ImportResult::default();
        for (index, request) in preview.requests {
            match self.people.create_checked(actor, request).await {
                Ok(person) => result.created.push(person.id),
                Err(e) => {
                    tracing::warn!("Import row {} failed: {}", index, e);
                    let error = match e {
                        AppError::Database(_) | AppError::Internal(_) => "Internal error".to_string(),
                        other => other.to_string(),
                    };
                    result.failed.push(ImportFailure { index, error });
                }
            }
        }

        tracing::info!(
            "Imported {} people ({} failed)",
            result.created.len(),
            result.failed.len()
        );
        self.audit
            .record(
                NewAuditEntry::new(actor, "import", "person", None).with_details(format!(
                    "{} created, {} failed",
                    result.created.len(),
                    result.failed.len()
                )),
            )
            .await;

        Ok(result)
    }
}
