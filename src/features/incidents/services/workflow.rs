//! Incident approval workflow.
//!
//! Every status change is looked up in [`TRANSITIONS`], keyed by the current status and
//! the capacity the caller acts in. Edges missing from the table are refused.
//!
//! ```text
//! DRAFT           --reporter--> PENDING_CAPTAIN
//! REJECTED        --reporter--> PENDING_CAPTAIN
//! PENDING_CAPTAIN --captain---> PENDING_ADMIN | REJECTED
//! PENDING_ADMIN   --admin-----> APPROVED | REJECTED
//! APPROVED        (terminal)
//! ```

use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::features::incidents::models::{Incident, IncidentChanges, IncidentStatus};

/// Capacity in which a caller touches an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Reporter,
    Captain,
    Admin,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Reporter => write!(f, "reporter"),
            Actor::Captain => write!(f, "captain"),
            Actor::Admin => write!(f, "admin"),
        }
    }
}

/// (current status, actor) -> statuses the actor may move the incident to
const TRANSITIONS: &[(IncidentStatus, Actor, &[IncidentStatus])] = &[
    (
        IncidentStatus::Draft,
        Actor::Reporter,
        &[IncidentStatus::PendingCaptain],
    ),
    (
        IncidentStatus::Rejected,
        Actor::Reporter,
        &[IncidentStatus::PendingCaptain],
    ),
    (
        IncidentStatus::PendingCaptain,
        Actor::Captain,
        &[IncidentStatus::PendingAdmin, IncidentStatus::Rejected],
    ),
    (
        IncidentStatus::PendingAdmin,
        Actor::Admin,
        &[IncidentStatus::Approved, IncidentStatus::Rejected],
    ),
];

/// Requested changes to an incident, as received from the caller
#[derive(Debug, Clone, Default)]
pub struct TransitionRequest {
    pub status: Option<IncidentStatus>,
    pub description: Option<String>,
    pub captain_comment: Option<String>,
    pub admin_comment: Option<String>,
    /// Status the caller last saw; a mismatch means someone else moved the incident
    pub expected_status: Option<IncidentStatus>,
}

/// Row of the table for this pair, if the actor may touch the incident at all
fn table_entry(from: IncidentStatus, actor: Actor) -> Option<&'static [IncidentStatus]> {
    TRANSITIONS
        .iter()
        .find(|(status, who, _)| *status == from && *who == actor)
        .map(|(_, _, targets)| *targets)
}

pub fn allowed_targets(from: IncidentStatus, actor: Actor) -> &'static [IncidentStatus] {
    table_entry(from, actor).unwrap_or(&[])
}

pub fn can_transition(from: IncidentStatus, actor: Actor, to: IncidentStatus) -> bool {
    allowed_targets(from, actor).contains(&to)
}

/// Work out the capacity the caller acts in on this incident.
///
/// The reporter keeps control of their own drafts and rejected reports whatever their role;
/// otherwise reviewers act by role and employees are refused.
pub fn acting_as(caller: &AuthenticatedUser, incident: &Incident) -> Result<Actor> {
    let is_reporter = caller.id == incident.reporter_id;
    if is_reporter && incident.status.is_reporter_editable() {
        return Ok(Actor::Reporter);
    }

    match caller.role {
        Role::Captain => Ok(Actor::Captain),
        Role::Admin => Ok(Actor::Admin),
        Role::Employee if is_reporter => Err(AppError::Forbidden(format!(
            "Current status {} is not editable",
            incident.status
        ))),
        Role::Employee => Err(AppError::Forbidden(
            "Only the reporter may edit this incident".to_string(),
        )),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ensure_field_allowed(
    value: &Option<String>,
    field: &str,
    owner: Actor,
    actor: Actor,
) -> Result<()> {
    if value.is_some() && owner != actor {
        return Err(AppError::Forbidden(format!(
            "The {} cannot set {}",
            actor, field
        )));
    }
    Ok(())
}

/// Check a request against the table and turn it into the changes to persist
pub fn authorize(
    caller: &AuthenticatedUser,
    incident: &Incident,
    request: TransitionRequest,
) -> Result<IncidentChanges> {
    let current = incident.status;

    if let Some(expected) = request.expected_status {
        if expected != current {
            return Err(AppError::Conflict(format!(
                "Incident {} is {}, not {}",
                incident.id, current, expected
            )));
        }
    }

    let actor = acting_as(caller, incident)?;
    if table_entry(current, actor).is_none() {
        return Err(AppError::Forbidden(format!(
            "The {} cannot modify an incident that is {}",
            actor, current
        )));
    }

    let target = request.status.filter(|to| *to != current);
    if let Some(to) = target {
        if !can_transition(current, actor, to) {
            return Err(AppError::Forbidden(format!(
                "The {} cannot move an incident from {} to {}",
                actor, current, to
            )));
        }
    }

    let description = non_blank(request.description);
    let captain_comment = non_blank(request.captain_comment);
    let admin_comment = non_blank(request.admin_comment);

    ensure_field_allowed(&description, "the description", Actor::Reporter, actor)?;
    ensure_field_allowed(&captain_comment, "a captain comment", Actor::Captain, actor)?;
    ensure_field_allowed(&admin_comment, "an admin comment", Actor::Admin, actor)?;

    let approver_id: Option<Uuid> = match actor {
        Actor::Captain | Actor::Admin => Some(caller.id),
        Actor::Reporter => None,
    };

    Ok(IncidentChanges {
        status: target,
        description,
        captain_comment,
        admin_comment,
        approver_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::now_v7(),
            username: format!("{}", role).to_lowercase(),
            role,
        }
    }

    fn incident(reporter_id: Uuid, status: IncidentStatus) -> Incident {
        Incident {
            id: Uuid::now_v7(),
            reporter_id,
            description: "Door fault at car 3".to_string(),
            voice_text: None,
            location: None,
            latitude: None,
            longitude: None,
            status,
            captain_comment: None,
            admin_comment: None,
            approver_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn to(status: IncidentStatus) -> TransitionRequest {
        TransitionRequest {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn test_table_lists_only_workflow_edges() {
        use IncidentStatus::*;
        let mut edges = 0;
        for from in IncidentStatus::ALL {
            for actor in [Actor::Reporter, Actor::Captain, Actor::Admin] {
                for target in IncidentStatus::ALL {
                    if can_transition(from, actor, target) {
                        edges += 1;
                    }
                }
            }
        }
        assert_eq!(edges, 6);
        assert!(can_transition(Draft, Actor::Reporter, PendingCaptain));
        assert!(can_transition(Rejected, Actor::Reporter, PendingCaptain));
        assert!(can_transition(PendingCaptain, Actor::Captain, PendingAdmin));
        assert!(can_transition(PendingAdmin, Actor::Admin, Approved));
        assert!(!can_transition(PendingCaptain, Actor::Captain, Approved));
        assert!(!can_transition(PendingCaptain, Actor::Admin, Approved));
        assert!(allowed_targets(Approved, Actor::Admin).is_empty());
    }

    #[test]
    fn test_reporter_submits_draft() {
        let driver = user(Role::Employee);
        let draft = incident(driver.id, IncidentStatus::Draft);

        let changes = authorize(
            &driver,
            &draft,
            TransitionRequest {
                status: Some(IncidentStatus::PendingCaptain),
                description: Some("  Updated  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(changes.status, Some(IncidentStatus::PendingCaptain));
        assert_eq!(changes.description.as_deref(), Some("Updated"));
        assert_eq!(changes.approver_id, None);
    }

    #[test]
    fn test_reporter_cannot_edit_approved() {
        let driver = user(Role::Employee);
        let approved = incident(driver.id, IncidentStatus::Approved);

        let err = authorize(&driver, &approved, to(IncidentStatus::PendingCaptain)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg.contains("not editable")));
    }

    #[test]
    fn test_reporter_cannot_self_approve() {
        let driver = user(Role::Employee);
        let draft = incident(driver.id, IncidentStatus::Draft);

        assert!(matches!(
            authorize(&driver, &draft, to(IncidentStatus::Approved)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_other_employee_is_refused() {
        let reporter = user(Role::Employee);
        let other = user(Role::Employee);
        let draft = incident(reporter.id, IncidentStatus::Draft);

        let err = authorize(&other, &draft, to(IncidentStatus::PendingCaptain)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg.contains("Only the reporter")));
    }

    #[test]
    fn test_captain_forwards_to_admin() {
        let captain = user(Role::Captain);
        let pending = incident(Uuid::now_v7(), IncidentStatus::PendingCaptain);

        let changes = authorize(
            &captain,
            &pending,
            TransitionRequest {
                status: Some(IncidentStatus::PendingAdmin),
                captain_comment: Some("checked".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(changes.status, Some(IncidentStatus::PendingAdmin));
        assert_eq!(changes.captain_comment.as_deref(), Some("checked"));
        assert_eq!(changes.admin_comment, None);
        assert_eq!(changes.approver_id, Some(captain.id));
    }

    #[test]
    fn test_captain_cannot_approve_or_touch_admin_stage() {
        let captain = user(Role::Captain);
        let pending_captain = incident(Uuid::now_v7(), IncidentStatus::PendingCaptain);
        let pending_admin = incident(Uuid::now_v7(), IncidentStatus::PendingAdmin);

        assert!(authorize(&captain, &pending_captain, to(IncidentStatus::Approved)).is_err());
        assert!(authorize(&captain, &pending_admin, to(IncidentStatus::Rejected)).is_err());
    }

    #[test]
    fn test_admin_decides_pending_admin_only() {
        let admin = user(Role::Admin);
        let pending_admin = incident(Uuid::now_v7(), IncidentStatus::PendingAdmin);
        let pending_captain = incident(Uuid::now_v7(), IncidentStatus::PendingCaptain);
        let draft = incident(Uuid::now_v7(), IncidentStatus::Draft);

        let changes = authorize(&admin, &pending_admin, to(IncidentStatus::Approved)).unwrap();
        assert_eq!(changes.status, Some(IncidentStatus::Approved));
        assert_eq!(changes.approver_id, Some(admin.id));

        assert!(authorize(&admin, &pending_captain, to(IncidentStatus::PendingAdmin)).is_err());
        assert!(authorize(&admin, &draft, to(IncidentStatus::Rejected)).is_err());
    }

    #[test]
    fn test_fields_belong_to_their_actor() {
        let captain = user(Role::Captain);
        let admin = user(Role::Admin);
        let pending_captain = incident(Uuid::now_v7(), IncidentStatus::PendingCaptain);
        let pending_admin = incident(Uuid::now_v7(), IncidentStatus::PendingAdmin);

        let captain_rewrite = TransitionRequest {
            description: Some("rewritten".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            authorize(&captain, &pending_captain, captain_rewrite),
            Err(AppError::Forbidden(_))
        ));

        let admin_as_captain = TransitionRequest {
            captain_comment: Some("sneaky".to_string()),
            ..Default::default()
        };
        assert!(authorize(&admin, &pending_admin, admin_as_captain).is_err());

        // Blank values count as absent
        let blank = TransitionRequest {
            description: Some("   ".to_string()),
            admin_comment: Some("noted".to_string()),
            ..Default::default()
        };
        let changes = authorize(&admin, &pending_admin, blank).unwrap();
        assert_eq!(changes.status, None);
        assert_eq!(changes.admin_comment.as_deref(), Some("noted"));
    }

    #[test]
    fn test_captain_resubmits_own_rejected_as_reporter() {
        let captain = user(Role::Captain);
        let rejected = incident(captain.id, IncidentStatus::Rejected);

        assert_eq!(acting_as(&captain, &rejected).unwrap(), Actor::Reporter);
        let changes = authorize(&captain, &rejected, to(IncidentStatus::PendingCaptain)).unwrap();
        assert_eq!(changes.status, Some(IncidentStatus::PendingCaptain));
        assert_eq!(changes.approver_id, None);
    }

    #[test]
    fn test_stale_expected_status_conflicts() {
        let admin = user(Role::Admin);
        let approved = incident(Uuid::now_v7(), IncidentStatus::Approved);

        let request = TransitionRequest {
            status: Some(IncidentStatus::Rejected),
            expected_status: Some(IncidentStatus::PendingAdmin),
            ..Default::default()
        };
        assert!(matches!(
            authorize(&admin, &approved, request),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_same_status_is_field_only_edit() {
        let driver = user(Role::Employee);
        let draft = incident(driver.id, IncidentStatus::Draft);

        let changes = authorize(
            &driver,
            &draft,
            TransitionRequest {
                status: Some(IncidentStatus::Draft),
                description: Some("more detail".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(changes.status, None);
        assert_eq!(changes.description.as_deref(), Some("more detail"));
    }
}
