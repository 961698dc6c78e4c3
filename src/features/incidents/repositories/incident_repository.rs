use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::incidents::models::{
    CreateAttachment, CreateIncident, IncidentChanges, IncidentRecord, IncidentStatus,
};
use crate::features::incidents::services::ListScope;

/// Persistence seam for incidents and their attachments
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// Insert the incident and all of its attachments as one unit; nothing is
    /// stored if any row fails.
    async fn insert_with_attachments(
        &self,
        incident: &CreateIncident,
        attachments: &[CreateAttachment],
    ) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncidentRecord>>;

    /// Incidents visible under `scope`, newest first
    async fn list(&self, scope: ListScope) -> Result<Vec<IncidentRecord>>;

    /// Apply `changes` only if the incident is still in `expected` status.
    ///
    /// Returns `false` when no row matched (missing, or moved by another writer).
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: IncidentStatus,
        changes: &IncidentChanges,
    ) -> Result<bool>;
}
