use std::sync::Arc;

use crate::{
    domain::{AuditLog, NewAuditEntry},
    error::Result,
    repository::AuditRepository,
};

pub struct AuditService {
    repo: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    /// Record an entry. The change it describes has already happened, so a
    /// failed write is logged and swallowed.
    pub async fn record(&self, entry: NewAuditEntry) {
        let action = entry.action.clone();
        let entity_type = entry.entity_type.clone();
        match self.repo.record(entry).await {
            Ok(log) => tracing::debug!(
                "Audit {} {} {:?} by {:?}",
                log.action,
                log.entity_type,
                log.entity_id,
                log.actor_username
            ),
            Err(e) => tracing::warn!("Failed to record audit entry {} {}: {}", action, entity_type, e),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<AuditLog>> {
        self.repo.list_all().await
    }
}
