//! In-memory repository used by service and handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::IncidentRepository;
use crate::core::error::{AppError, Result};
use crate::features::incidents::models::{
    Attachment, CreateAttachment, CreateIncident, Incident, IncidentChanges, IncidentRecord,
    IncidentStatus, UserSummary,
};
use crate::features::incidents::services::ListScope;

#[derive(Default)]
struct State {
    incidents: Vec<Incident>,
    attachments: Vec<Attachment>,
    users: HashMap<Uuid, UserSummary>,
}

#[derive(Default)]
pub struct InMemoryIncidentRepository {
    state: Mutex<State>,
    fail_inserts: AtomicBool,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: Uuid, name: &str, department: Option<&str>) {
        self.state.lock().unwrap().users.insert(
            id,
            UserSummary {
                name: name.to_string(),
                department: department.map(String::from),
            },
        );
    }

    /// Make every following insert fail, as a broken database would
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    /// Move an incident to `status` behind the service's back
    pub fn force_status(&self, id: Uuid, status: IncidentStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(incident) = state.incidents.iter_mut().find(|i| i.id == id) {
            incident.status = status;
        }
    }

    pub fn incident_count(&self) -> usize {
        self.state.lock().unwrap().incidents.len()
    }

    pub fn attachment_count(&self) -> usize {
        self.state.lock().unwrap().attachments.len()
    }

    fn record(state: &State, incident: &Incident) -> IncidentRecord {
        IncidentRecord {
            incident: incident.clone(),
            reporter: state.users.get(&incident.reporter_id).cloned(),
            approver_name: incident
                .approver_id
                .and_then(|id| state.users.get(&id))
                .map(|u| u.name.clone()),
            attachments: state
                .attachments
                .iter()
                .filter(|a| a.incident_id == incident.id)
                .cloned()
                .collect(),
        }
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn insert_with_attachments(
        &self,
        incident: &CreateIncident,
        attachments: &[CreateAttachment],
    ) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        state.incidents.push(Incident {
            id: incident.id,
            reporter_id: incident.reporter_id,
            description: incident.description.clone(),
            voice_text: incident.voice_text.clone(),
            location: incident.location.clone(),
            latitude: incident.latitude,
            longitude: incident.longitude,
            status: incident.status,
            captain_comment: None,
            admin_comment: None,
            approver_id: None,
            created_at: now,
            updated_at: now,
        });
        state
            .attachments
            .extend(attachments.iter().map(|a| Attachment {
                id: a.id,
                incident_id: a.incident_id,
                attachment_type: a.attachment_type,
                url: a.url.clone(),
                original_filename: a.original_filename.clone(),
                content_type: a.content_type.clone(),
                file_size: a.file_size,
                created_at: now,
            }));
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncidentRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .incidents
            .iter()
            .find(|i| i.id == id)
            .map(|i| Self::record(&state, i)))
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<IncidentRecord>> {
        let state = self.state.lock().unwrap();
        let mut visible: Vec<&Incident> = state
            .incidents
            .iter()
            .filter(|i| scope.includes(i))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(visible
            .into_iter()
            .map(|i| Self::record(&state, i))
            .collect())
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: IncidentStatus,
        changes: &IncidentChanges,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(incident) = state
            .incidents
            .iter_mut()
            .find(|i| i.id == id && i.status == expected)
        else {
            return Ok(false);
        };

        if let Some(status) = changes.status {
            incident.status = status;
        }
        if let Some(description) = &changes.description {
            incident.description = description.clone();
        }
        if let Some(comment) = &changes.captain_comment {
            incident.captain_comment = Some(comment.clone());
        }
        if let Some(comment) = &changes.admin_comment {
            incident.admin_comment = Some(comment.clone());
        }
        if let Some(approver_id) = changes.approver_id {
            incident.approver_id = Some(approver_id);
        }
        incident.updated_at = Utc::now();
        Ok(true)
    }
}
