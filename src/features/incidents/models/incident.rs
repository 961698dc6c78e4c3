use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Attachment;

/// Incident lifecycle status matching the `incident_status` database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "incident_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Draft,
    PendingCaptain,
    PendingAdmin,
    Approved,
    Rejected,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 5] = [
        IncidentStatus::Draft,
        IncidentStatus::PendingCaptain,
        IncidentStatus::PendingAdmin,
        IncidentStatus::Approved,
        IncidentStatus::Rejected,
    ];

    /// Anything but a draft has been handed to reviewers
    pub fn is_submitted(self) -> bool {
        self != IncidentStatus::Draft
    }

    /// States in which the reporter still holds the pen
    pub fn is_reporter_editable(self) -> bool {
        matches!(self, IncidentStatus::Draft | IncidentStatus::Rejected)
    }

    /// Statuses a report may be created in
    pub fn is_valid_initial(self) -> bool {
        matches!(self, IncidentStatus::Draft | IncidentStatus::PendingCaptain)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Draft => "DRAFT",
            IncidentStatus::PendingCaptain => "PENDING_CAPTAIN",
            IncidentStatus::PendingAdmin => "PENDING_ADMIN",
            IncidentStatus::Approved => "APPROVED",
            IncidentStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        IncidentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Unknown incident status '{}'", s))
    }
}

/// Database model for incidents
#[derive(Debug, Clone, FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub description: String,
    pub voice_text: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: IncidentStatus,
    pub captain_comment: Option<String>,
    pub admin_comment: Option<String>,
    pub approver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name and department of a staff member, joined from `users`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub name: String,
    pub department: Option<String>,
}

/// Incident joined with the people it references and its attachments
#[derive(Debug, Clone)]
pub struct IncidentRecord {
    pub incident: Incident,
    pub reporter: Option<UserSummary>,
    pub approver_name: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Data for creating a new incident
#[derive(Debug, Clone)]
pub struct CreateIncident {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub description: String,
    pub voice_text: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: IncidentStatus,
}

/// Field changes applied by a permitted transition.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentChanges {
    pub status: Option<IncidentStatus>,
    pub description: Option<String>,
    pub captain_comment: Option<String>,
    pub admin_comment: Option<String>,
    pub approver_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        for status in IncidentStatus::ALL {
            assert_eq!(status.to_string().parse::<IncidentStatus>(), Ok(status));
        }
        assert_eq!(
            "pending_admin".parse::<IncidentStatus>(),
            Ok(IncidentStatus::PendingAdmin)
        );
        assert!("CLOSED".parse::<IncidentStatus>().is_err());
    }

    #[test]
    fn test_status_serde_spelling() {
        let json = serde_json::to_string(&IncidentStatus::PendingCaptain).unwrap();
        assert_eq!(json, "\"PENDING_CAPTAIN\"");
    }

    #[test]
    fn test_status_predicates() {
        assert!(!IncidentStatus::Draft.is_submitted());
        assert!(IncidentStatus::Rejected.is_submitted());
        assert!(IncidentStatus::Rejected.is_reporter_editable());
        assert!(!IncidentStatus::PendingAdmin.is_reporter_editable());
        assert!(IncidentStatus::PendingCaptain.is_valid_initial());
        assert!(!IncidentStatus::Approved.is_valid_initial());
    }
}
