//! Who sees which incidents.

use std::str::FromStr;

use uuid::Uuid;

use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::features::incidents::models::Incident;

/// Filter applied when listing incidents for a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Only incidents the user reported
    ReportedBy(Uuid),
    /// The user's own incidents plus everything submitted by anyone
    ReportedByOrSubmitted(Uuid),
    /// Everything except drafts
    Submitted,
}

impl ListScope {
    pub fn for_caller(caller: &AuthenticatedUser) -> Self {
        match caller.role {
            Role::Employee => ListScope::ReportedBy(caller.id),
            Role::Captain => ListScope::ReportedByOrSubmitted(caller.id),
            Role::Admin => ListScope::Submitted,
        }
    }

    pub fn includes(&self, incident: &Incident) -> bool {
        match *self {
            ListScope::ReportedBy(user_id) => incident.reporter_id == user_id,
            ListScope::ReportedByOrSubmitted(user_id) => {
                incident.reporter_id == user_id || incident.status.is_submitted()
            }
            ListScope::Submitted => incident.status.is_submitted(),
        }
    }
}

/// Policy for fetching a single incident by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailVisibility {
    /// Any authenticated caller may read any incident
    #[default]
    Open,
    /// Same rule as listing
    Scoped,
}

impl DetailVisibility {
    pub fn can_view(&self, caller: &AuthenticatedUser, incident: &Incident) -> bool {
        match self {
            DetailVisibility::Open => true,
            DetailVisibility::Scoped => ListScope::for_caller(caller).includes(incident),
        }
    }
}

impl FromStr for DetailVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(DetailVisibility::Open),
            "scoped" => Ok(DetailVisibility::Scoped),
            other => Err(format!(
                "INCIDENT_DETAIL_VISIBILITY must be 'open' or 'scoped', got '{}'",
                other
            )),
        }
    }
}
