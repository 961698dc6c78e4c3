use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::IncidentRepository;
use crate::core::error::{AppError, Result};
use crate::features::incidents::models::{
    Attachment, CreateAttachment, CreateIncident, Incident, IncidentChanges, IncidentRecord,
    IncidentStatus, UserSummary,
};
use crate::features::incidents::services::ListScope;

/// Incident columns plus the reporter and approver joined from `users`
const INCIDENT_SELECT: &str = r#"
    SELECT
        i.id, i.reporter_id, i.description, i.voice_text, i.location,
        i.latitude, i.longitude, i.status, i.captain_comment, i.admin_comment,
        i.approver_id, i.created_at, i.updated_at,
        r.name AS reporter_name,
        r.department AS reporter_department,
        a.name AS approver_name
    FROM incidents i
    LEFT JOIN users r ON r.id = i.reporter_id
    LEFT JOIN users a ON a.id = i.approver_id
"#;

const ORDER_NEWEST_FIRST: &str = "ORDER BY i.created_at DESC, i.id DESC";

#[derive(Debug, FromRow)]
struct IncidentRow {
    #[sqlx(flatten)]
    incident: Incident,
    reporter_name: Option<String>,
    reporter_department: Option<String>,
    approver_name: Option<String>,
}

impl IncidentRow {
    fn into_record(self, attachments: Vec<Attachment>) -> IncidentRecord {
        let reporter = self.reporter_name.map(|name| UserSummary {
            name,
            department: self.reporter_department,
        });

        IncidentRecord {
            incident: self.incident,
            reporter,
            approver_name: self.approver_name,
            attachments,
        }
    }
}

/// Postgres-backed incident persistence
pub struct PgIncidentRepository {
    pool: PgPool,
}

impl PgIncidentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attachments for the given incidents, grouped by incident and in upload order
    async fn attachments_for(
        &self,
        incident_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Attachment>>> {
        if incident_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, Attachment>(
            r#"
            SELECT
                id, incident_id, attachment_type, url,
                original_filename, content_type, file_size, created_at
            FROM attachments
            WHERE incident_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(incident_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load attachments: {:?}", e);
            AppError::Database(e)
        })?;

        let mut grouped: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
        for attachment in rows {
            grouped
                .entry(attachment.incident_id)
                .or_default()
                .push(attachment);
        }
        Ok(grouped)
    }

    async fn with_attachments(&self, rows: Vec<IncidentRow>) -> Result<Vec<IncidentRecord>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.incident.id).collect();
        let mut attachments = self.attachments_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let own = attachments.remove(&row.incident.id).unwrap_or_default();
                row.into_record(own)
            })
            .collect())
    }
}

#[async_trait]
impl IncidentRepository for PgIncidentRepository {
    async fn insert_with_attachments(
        &self,
        incident: &CreateIncident,
        attachments: &[CreateAttachment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO incidents (
                id, reporter_id, description, voice_text, location,
                latitude, longitude, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(incident.id)
        .bind(incident.reporter_id)
        .bind(&incident.description)
        .bind(&incident.voice_text)
        .bind(&incident.location)
        .bind(incident.latitude)
        .bind(incident.longitude)
        .bind(incident.status)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create incident: {:?}", e);
            AppError::Database(e)
        })?;

        for attachment in attachments {
            sqlx::query(
                r#"
                INSERT INTO attachments (
                    id, incident_id, attachment_type, url,
                    original_filename, content_type, file_size
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(attachment.id)
            .bind(attachment.incident_id)
            .bind(attachment.attachment_type)
            .bind(&attachment.url)
            .bind(&attachment.original_filename)
            .bind(&attachment.content_type)
            .bind(attachment.file_size)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create attachment: {:?}", e);
                AppError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncidentRecord>> {
        let sql = format!("{} WHERE i.id = $1", INCIDENT_SELECT);
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get incident: {:?}", e);
                AppError::Database(e)
            })?;

        match row {
            Some(row) => Ok(self.with_attachments(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<IncidentRecord>> {
        let rows = match scope {
            ListScope::ReportedBy(user_id) => {
                let sql = format!(
                    "{} WHERE i.reporter_id = $1 {}",
                    INCIDENT_SELECT, ORDER_NEWEST_FIRST
                );
                sqlx::query_as::<_, IncidentRow>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
            ListScope::ReportedByOrSubmitted(user_id) => {
                let sql = format!(
                    "{} WHERE i.reporter_id = $1 OR i.status <> $2 {}",
                    INCIDENT_SELECT, ORDER_NEWEST_FIRST
                );
                sqlx::query_as::<_, IncidentRow>(&sql)
                    .bind(user_id)
                    .bind(IncidentStatus::Draft)
                    .fetch_all(&self.pool)
                    .await
            }
            ListScope::Submitted => {
                let sql = format!(
                    "{} WHERE i.status <> $1 {}",
                    INCIDENT_SELECT, ORDER_NEWEST_FIRST
                );
                sqlx::query_as::<_, IncidentRow>(&sql)
                    .bind(IncidentStatus::Draft)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            tracing::error!("Failed to list incidents: {:?}", e);
            AppError::Database(e)
        })?;

        self.with_attachments(rows).await
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: IncidentStatus,
        changes: &IncidentChanges,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE incidents
            SET status = COALESCE($3, status),
                description = COALESCE($4, description),
                captain_comment = COALESCE($5, captain_comment),
                admin_comment = COALESCE($6, admin_comment),
                approver_id = COALESCE($7, approver_id),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(changes.status)
        .bind(&changes.description)
        .bind(&changes.captain_comment)
        .bind(&changes.admin_comment)
        .bind(changes.approver_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update incident: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(result.rows_affected() == 1)
    }
}
