use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::incidents::dtos::{
    get_extension_from_content_type, CreateIncidentDto, UploadedFile,
};
use crate::features::incidents::models::{
    AttachmentType, CreateAttachment, CreateIncident, IncidentRecord, IncidentStatus,
};
use crate::features::incidents::repositories::IncidentRepository;
use crate::features::incidents::services::workflow;
use crate::features::incidents::services::{DetailVisibility, ListScope, TransitionRequest};
use crate::modules::storage::BlobStore;

/// Incident lifecycle: reporting, role-scoped reads and the approval workflow
pub struct IncidentService {
    repository: Arc<dyn IncidentRepository>,
    storage: Arc<dyn BlobStore>,
    detail_visibility: DetailVisibility,
    max_attachment_size: usize,
}

impl IncidentService {
    pub fn new(
        repository: Arc<dyn IncidentRepository>,
        storage: Arc<dyn BlobStore>,
        detail_visibility: DetailVisibility,
        max_attachment_size: usize,
    ) -> Self {
        Self {
            repository,
            storage,
            detail_visibility,
            max_attachment_size,
        }
    }

    /// Report a new incident with its attachments.
    ///
    /// Blobs are stored first, then the incident and all attachment rows are written
    /// in one transaction. If anything fails, the stored blobs are removed again and
    /// nothing is persisted.
    pub async fn create(
        &self,
        reporter: &AuthenticatedUser,
        dto: CreateIncidentDto,
        uploads: Vec<UploadedFile>,
    ) -> Result<IncidentRecord> {
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        ensure_finite("latitude", dto.latitude)?;
        ensure_finite("longitude", dto.longitude)?;

        let status = dto.status.unwrap_or(IncidentStatus::Draft);
        if !status.is_valid_initial() {
            return Err(AppError::Validation(format!(
                "A new incident must be DRAFT or PENDING_CAPTAIN, not {}",
                status
            )));
        }

        for upload in &uploads {
            if upload.data.len() > self.max_attachment_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "Attachment '{}' exceeds the maximum size of {} bytes",
                    upload.field_name, self.max_attachment_size
                )));
            }
            if upload.content_type.len() > MAX_METADATA_LEN {
                return Err(AppError::BadRequest(format!(
                    "Content type of attachment '{}' is longer than {} characters",
                    upload.field_name, MAX_METADATA_LEN
                )));
            }
        }

        let incident_id = Uuid::now_v7();
        let mut attachments = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let attachment_type =
                AttachmentType::classify(&upload.content_type, &upload.field_name);
            let key = attachment_key(reporter.id, incident_id, &upload);
            let file_size = upload.data.len() as i64;

            let url = match self
                .storage
                .put(&key, upload.data, &upload.content_type)
                .await
            {
                Ok(url) => url,
                Err(e) => {
                    self.discard_blobs(&attachments).await;
                    return Err(e);
                }
            };
            debug!("Stored attachment {} as {}", key, attachment_type);

            attachments.push(CreateAttachment {
                id: Uuid::now_v7(),
                incident_id,
                attachment_type,
                url,
                original_filename: upload.file_name.map(|name| clip(name, MAX_METADATA_LEN)),
                content_type: upload.content_type,
                file_size,
            });
        }

        let incident = CreateIncident {
            id: incident_id,
            reporter_id: reporter.id,
            description: dto.description,
            voice_text: dto.voice_text,
            location: dto.location,
            latitude: dto.latitude,
            longitude: dto.longitude,
            status,
        };

        if let Err(e) = self
            .repository
            .insert_with_attachments(&incident, &attachments)
            .await
        {
            self.discard_blobs(&attachments).await;
            return Err(e);
        }

        info!(
            "Incident created: id={}, reporter={}, status={}, attachments={}",
            incident_id,
            reporter.id,
            status,
            attachments.len()
        );

        self.repository
            .find_by_id(incident_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!("Incident {} vanished after insert", incident_id))
            })
    }

    /// Incidents visible to `caller`, newest first
    pub async fn list(&self, caller: &AuthenticatedUser) -> Result<Vec<IncidentRecord>> {
        self.repository.list(ListScope::for_caller(caller)).await
    }

    /// One incident with reporter, approver and attachments
    pub async fn get_detail(&self, id: Uuid, caller: &AuthenticatedUser) -> Result<IncidentRecord> {
        let record = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))?;

        // Hidden incidents look the same as missing ones
        if !self.detail_visibility.can_view(caller, &record.incident) {
            return Err(AppError::NotFound(format!("Incident {} not found", id)));
        }

        Ok(record)
    }

    /// Apply a workflow step or field edit on behalf of `caller`
    pub async fn transition(
        &self,
        id: Uuid,
        caller: &AuthenticatedUser,
        request: TransitionRequest,
    ) -> Result<IncidentRecord> {
        let current = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))?;
        let from = current.incident.status;

        let changes = workflow::authorize(caller, &current.incident, request)?;

        if !self.repository.update_if_status(id, from, &changes).await? {
            return Err(AppError::Conflict(format!(
                "Incident {} was modified concurrently; reload and retry",
                id
            )));
        }

        info!(
            "Incident updated: id={}, by={} ({}), {} -> {}",
            id,
            caller.id,
            caller.role,
            from,
            changes.status.unwrap_or(from)
        );

        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))
    }

    async fn discard_blobs(&self, attachments: &[CreateAttachment]) {
        for attachment in attachments {
            if let Err(e) = self.storage.remove(&attachment.url).await {
                warn!("Failed to remove orphaned blob {}: {}", attachment.url, e);
            }
        }
    }
}

/// Column width of `original_filename` and `content_type`
const MAX_METADATA_LEN: usize = 255;

/// Keep at most `max` characters of `value`
fn clip(value: String, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value,
    }
}

fn ensure_finite(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(AppError::Validation(format!(
            "{} must be a finite number",
            field
        ))),
        _ => Ok(()),
    }
}

/// Storage key: `incidents/{reporter}/{incident}/{field}-{uuid}.{ext}`
fn attachment_key(reporter_id: Uuid, incident_id: Uuid, upload: &UploadedFile) -> String {
    let field: String = upload
        .field_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let field = if field.is_empty() { "file" } else { field.as_str() };

    let extension = get_extension_from_content_type(&upload.content_type)
        .map(str::to_string)
        .or_else(|| {
            upload
                .file_name
                .as_deref()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .filter(|ext| {
                    !ext.is_empty()
                        && ext.len() <= 8
                        && ext.chars().all(|c| c.is_ascii_alphanumeric())
                })
        })
        .unwrap_or_else(|| "bin".to_string());

    format!(
        "incidents/{}/{}/{}-{}.{}",
        reporter_id,
        incident_id,
        field,
        Uuid::new_v4(),
        extension
    )
}
