use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::incidents::models::{
    Attachment, AttachmentType, IncidentRecord, IncidentStatus, UserSummary,
};
use crate::features::incidents::services::TransitionRequest;

/// Multipart form accepted by `POST /api/incidents`.
///
/// Documentation only; the handler reads the multipart stream directly. Any part
/// carrying a file name is stored as an attachment.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateIncidentForm {
    #[schema(example = "Platform screen door stuck open at Xiaohe station")]
    pub description: Option<String>,
    /// Transcribed voice note
    pub voice_text: Option<String>,
    #[schema(example = "Line 1, Xiaohe")]
    pub location: Option<String>,
    #[schema(example = "26.5123")]
    pub latitude: Option<String>,
    #[schema(example = "106.6789")]
    pub longitude: Option<String>,
    /// DRAFT (default) or PENDING_CAPTAIN
    pub status: Option<IncidentStatus>,
    /// Photo, audio or video file; use the field name `handwriting` for handwritten notes
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Option<String>,
}

/// Parsed incident fields from the create form
#[derive(Debug, Clone, Default, Validate)]
pub struct CreateIncidentDto {
    pub description: String,
    pub voice_text: Option<String>,
    #[validate(length(max = 255, message = "location must be at most 255 characters"))]
    pub location: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub latitude: Option<f64>,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "longitude must be within [-180, 180]"
    ))]
    pub longitude: Option<f64>,
    pub status: Option<IncidentStatus>,
}

/// One file part of the create form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Request body for `PUT /api/incidents/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateIncidentDto {
    pub status: Option<IncidentStatus>,
    pub description: Option<String>,
    #[serde(alias = "captainComment")]
    pub captain_comment: Option<String>,
    #[serde(alias = "adminComment")]
    pub admin_comment: Option<String>,
    /// Status the caller last saw; the update is refused with 409 if it has moved on
    #[serde(alias = "expectedStatus")]
    pub expected_status: Option<IncidentStatus>,
}

impl From<UpdateIncidentDto> for TransitionRequest {
    fn from(dto: UpdateIncidentDto) -> Self {
        Self {
            status: dto.status,
            description: dto.description,
            captain_comment: dto.captain_comment,
            admin_comment: dto.admin_comment,
            expected_status: dto.expected_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReporterDto {
    pub name: String,
    pub department: Option<String>,
}

impl From<UserSummary> for ReporterDto {
    fn from(u: UserSummary) -> Self {
        Self {
            name: u.name,
            department: u.department,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachmentResponseDto {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub url: String,
    pub original_filename: Option<String>,
    pub content_type: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponseDto {
    fn from(a: Attachment) -> Self {
        Self {
            id: a.id,
            attachment_type: a.attachment_type,
            url: a.url,
            original_filename: a.original_filename,
            content_type: a.content_type,
            file_size: a.file_size,
            created_at: a.created_at,
        }
    }
}

/// Incident with reporter, approver and attachments
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncidentResponseDto {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reporter: Option<ReporterDto>,
    pub description: String,
    pub voice_text: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: IncidentStatus,
    pub captain_comment: Option<String>,
    pub admin_comment: Option<String>,
    pub approver_id: Option<Uuid>,
    pub approver_name: Option<String>,
    pub attachments: Vec<AttachmentResponseDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IncidentRecord> for IncidentResponseDto {
    fn from(r: IncidentRecord) -> Self {
        let i = r.incident;
        Self {
            id: i.id,
            reporter_id: i.reporter_id,
            reporter: r.reporter.map(ReporterDto::from),
            description: i.description,
            voice_text: i.voice_text,
            location: i.location,
            latitude: i.latitude,
            longitude: i.longitude,
            status: i.status,
            captain_comment: i.captain_comment,
            admin_comment: i.admin_comment,
            approver_id: i.approver_id,
            approver_name: r.approver_name,
            attachments: r.attachments.into_iter().map(Into::into).collect(),
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

/// Extension for a stored attachment, from its media type
pub fn get_extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/webm" => Some("weba"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}
