use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart field name that marks a handwritten note
pub const HANDWRITING_FIELD: &str = "handwriting";

/// Attachment kind matching the `attachment_type` database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "attachment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentType {
    Photo,
    Audio,
    Video,
    Handwriting,
}

impl AttachmentType {
    /// Classify an upload by its declared media type, then by the field it arrived under.
    ///
    /// Media-type prefixes win over the field name, so an `audio/*` part sent as
    /// `handwriting` is still AUDIO.
    pub fn classify(content_type: &str, field_name: &str) -> Self {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type.starts_with("audio/") {
            AttachmentType::Audio
        } else if content_type.starts_with("video/") {
            AttachmentType::Video
        } else if field_name == HANDWRITING_FIELD {
            AttachmentType::Handwriting
        } else {
            AttachmentType::Photo
        }
    }
}

impl std::fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentType::Photo => write!(f, "PHOTO"),
            AttachmentType::Audio => write!(f, "AUDIO"),
            AttachmentType::Video => write!(f, "VIDEO"),
            AttachmentType::Handwriting => write!(f, "HANDWRITING"),
        }
    }
}

/// Database model for incident attachments
#[derive(Debug, Clone, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub attachment_type: AttachmentType,
    pub url: String,
    pub original_filename: Option<String>,
    pub content_type: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

/// Data for creating an attachment row
#[derive(Debug, Clone)]
pub struct CreateAttachment {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub attachment_type: AttachmentType,
    pub url: String,
    pub original_filename: Option<String>,
    pub content_type: String,
    pub file_size: i64,
}
