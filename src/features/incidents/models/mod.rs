mod attachment;
mod incident;

pub use attachment::{Attachment, AttachmentType, CreateAttachment};
pub use incident::{
    CreateIncident, Incident, IncidentChanges, IncidentRecord, IncidentStatus, UserSummary,
};
