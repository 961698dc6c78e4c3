use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, AppPath};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::incidents::dtos::{
    CreateIncidentDto, CreateIncidentForm, IncidentResponseDto, UpdateIncidentDto, UploadedFile,
};
use crate::features::incidents::models::IncidentStatus;
use crate::features::incidents::services::IncidentService;
use crate::shared::types::{ApiResponse, Meta};

/// State for incident handlers
#[derive(Clone)]
pub struct IncidentState {
    pub incident_service: Arc<IncidentService>,
}

/// Report an incident
///
/// Accepts multipart/form-data. Text fields: `description`, `voice_text`, `location`,
/// `latitude`, `longitude`, `status`. Every part with a file name is stored as an
/// attachment and classified by its media type and field name.
#[utoipa::path(
    post,
    path = "/api/incidents",
    tag = "incidents",
    request_body(
        content = CreateIncidentForm,
        content_type = "multipart/form-data",
        description = "Incident fields and attachments",
    ),
    responses(
        (status = 201, description = "Incident created", body = ApiResponse<IncidentResponseDto>),
        (status = 400, description = "Malformed form or invalid field"),
        (status = 401, description = "Authentication required"),
        (status = 413, description = "Request too large")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_incident(
    user: AuthenticatedUser,
    State(state): State<IncidentState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<IncidentResponseDto>>)> {
    let mut dto = CreateIncidentDto::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart data", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error("Failed to read file data", e))?;

            uploads.push(UploadedFile {
                field_name,
                file_name: Some(file_name).filter(|n| !n.is_empty()),
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        match field_name.as_str() {
            "description" => dto.description = read_text(field, &field_name).await?,
            "voice_text" | "voiceText" => {
                dto.voice_text = non_blank(read_text(field, &field_name).await?)
            }
            "location" => dto.location = non_blank(read_text(field, &field_name).await?),
            "latitude" => {
                dto.latitude = parse_coordinate(&field_name, read_text(field, &field_name).await?)?
            }
            "longitude" => {
                dto.longitude = parse_coordinate(&field_name, read_text(field, &field_name).await?)?
            }
            "status" => {
                dto.status = match non_blank(read_text(field, &field_name).await?) {
                    Some(s) => Some(s.parse::<IncidentStatus>().map_err(AppError::Validation)?),
                    None => None,
                }
            }
            _ => debug!("Ignoring unknown field: {}", field_name),
        }
    }

    let incident = state.incident_service.create(&user, dto, uploads).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(incident.into()),
            Some("Incident reported".to_string()),
            None,
        )),
    ))
}

/// List incidents visible to the caller
///
/// Employees see their own reports. Captains see their own reports plus every
/// submitted incident. Admins see every submitted incident. Newest first.
#[utoipa::path(
    get,
    path = "/api/incidents",
    responses(
        (status = 200, description = "Incidents", body = ApiResponse<Vec<IncidentResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn list_incidents(
    user: AuthenticatedUser,
    State(state): State<IncidentState>,
) -> Result<Json<ApiResponse<Vec<IncidentResponseDto>>>> {
    let incidents = state.incident_service.list(&user).await?;
    let total = incidents.len() as i64;
    let dtos: Vec<IncidentResponseDto> = incidents.into_iter().map(|i| i.into()).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta { total }),
    )))
}

/// Get incident by ID
#[utoipa::path(
    get,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Incident found", body = ApiResponse<IncidentResponseDto>),
        (status = 400, description = "Malformed ID"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn get_incident(
    user: AuthenticatedUser,
    State(state): State<IncidentState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<IncidentResponseDto>>> {
    let incident = state.incident_service.get_detail(id, &user).await?;
    Ok(Json(ApiResponse::success(Some(incident.into()), None, None)))
}

/// Move an incident through the approval workflow or edit its fields
///
/// Reporters edit and submit their DRAFT or REJECTED incidents. Captains review
/// PENDING_CAPTAIN incidents, admins decide PENDING_ADMIN ones.
#[utoipa::path(
    put,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    request_body = UpdateIncidentDto,
    responses(
        (status = 200, description = "Incident updated", body = ApiResponse<IncidentResponseDto>),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Transition or field not permitted for the caller"),
        (status = 404, description = "Incident not found"),
        (status = 409, description = "Incident changed since it was read")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn update_incident(
    user: AuthenticatedUser,
    State(state): State<IncidentState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(dto): AppJson<UpdateIncidentDto>,
) -> Result<Json<ApiResponse<IncidentResponseDto>>> {
    let incident = state
        .incident_service
        .transition(id, &user, dto.into())
        .await?;
    Ok(Json(ApiResponse::success(
        Some(incident.into()),
        Some("Incident updated".to_string()),
        None,
    )))
}

async fn read_text(field: Field<'_>, name: &str) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| multipart_error(&format!("Failed to read {} field", name), e))
}

/// Body limit hits surface as 413, everything else as a malformed form
fn multipart_error(context: &str, e: MultipartError) -> AppError {
    debug!("{}: {}", context, e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(format!("{}: {}", context, e.body_text()))
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_coordinate(name: &str, text: String) -> Result<Option<f64>> {
    match non_blank(text) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{} must be a decimal number", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::incidents::models::AttachmentType;
    use crate::features::incidents::repositories::memory::InMemoryIncidentRepository;
    use crate::features::incidents::routes;
    use crate::features::incidents::services::DetailVisibility;
    use crate::shared::test_helpers::{
        create_captain, create_employee, with_user_auth, MemoryBlobStore,
    };
    use axum::Router;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    const MB: usize = 1024 * 1024;

    fn service_with_limit(max_attachment_size: usize) -> Arc<IncidentService> {
        Arc::new(IncidentService::new(
            Arc::new(InMemoryIncidentRepository::new()),
            Arc::new(MemoryBlobStore::new()),
            DetailVisibility::Open,
            max_attachment_size,
        ))
    }

    fn service() -> Arc<IncidentService> {
        service_with_limit(MB)
    }

    fn server_with_limit(
        service: Arc<IncidentService>,
        user: AuthenticatedUser,
        max_attachment_size: usize,
    ) -> TestServer {
        let app: Router = with_user_auth(routes(service, max_attachment_size), user);
        TestServer::new(app).unwrap()
    }

    fn server(service: Arc<IncidentService>, user: AuthenticatedUser) -> TestServer {
        server_with_limit(service, user, MB)
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("latitude", "".into()).unwrap(), None);
        assert_eq!(
            parse_coordinate("latitude", " 26.5 ".into()).unwrap(),
            Some(26.5)
        );
        assert!(parse_coordinate("latitude", "north".into()).is_err());
        assert!(parse_coordinate("latitude", "inf".into()).is_err());
    }

    #[tokio::test]
    async fn test_create_with_attachments() {
        let server = server(service(), create_employee());

        let form = MultipartForm::new()
            .add_text("description", "Escalator stopped at exit B")
            .add_text("voiceText", "escalator stopped")
            .add_text("latitude", "26.57")
            .add_text("longitude", "")
            .add_part(
                "voice",
                Part::bytes(vec![1u8, 2, 3]).file_name("note.wav").mime_type("audio/wav"),
            )
            .add_part(
                "handwriting",
                Part::bytes(vec![4u8, 5]).file_name("note.png").mime_type("image/png"),
            );

        let response = server.post("/api/incidents").multipart(form).await;
        response.assert_status(StatusCode::CREATED);

        let body: ApiResponse<IncidentResponseDto> = response.json();
        let incident = body.data.unwrap();
        assert_eq!(incident.status, IncidentStatus::Draft);
        assert_eq!(incident.voice_text.as_deref(), Some("escalator stopped"));
        assert_eq!(incident.latitude, Some(26.57));
        assert_eq!(incident.longitude, None);
        let types: Vec<AttachmentType> = incident
            .attachments
            .iter()
            .map(|a| a.attachment_type)
            .collect();
        assert_eq!(types, vec![AttachmentType::Audio, AttachmentType::Handwriting]);
        assert_eq!(incident.attachments[0].original_filename.as_deref(), Some("note.wav"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_coordinate() {
        let server = server(service(), create_employee());

        let form = MultipartForm::new()
            .add_text("description", "x")
            .add_text("latitude", "not-a-number");
        let response = server.post("/api/incidents").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_body_limit_follows_attachment_size() {
        let limit = 3 * MB;
        let server = server_with_limit(service_with_limit(limit), create_employee(), limit);

        let form = MultipartForm::new()
            .add_text("description", "Platform camera footage")
            .add_part(
                "video",
                Part::bytes(vec![0u8; 5 * MB / 2])
                    .file_name("clip.mp4")
                    .mime_type("video/mp4"),
            );
        let response = server.post("/api/incidents").multipart(form).await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<IncidentResponseDto> = response.json();
        assert_eq!(
            body.data.unwrap().attachments[0].attachment_type,
            AttachmentType::Video
        );
    }

    #[tokio::test]
    async fn test_oversize_body_is_payload_too_large() {
        let server = server(service(), create_employee());

        let form = MultipartForm::new()
            .add_text("description", "Platform camera footage")
            .add_part(
                "video",
                Part::bytes(vec![0u8; 5 * MB / 2])
                    .file_name("clip.mp4")
                    .mime_type("video/mp4"),
            );
        let response = server.post("/api/incidents").multipart(form).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_list_reports_total() {
        let service = service();
        let reporter = create_employee();
        let server = server(service.clone(), reporter.clone());

        for text in ["first", "second"] {
            let form = MultipartForm::new().add_text("description", text);
            server
                .post("/api/incidents")
                .multipart(form)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server.get("/api/incidents").await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<IncidentResponseDto>> = response.json();
        assert_eq!(body.meta.unwrap().total, 2);
        assert_eq!(body.data.unwrap()[0].description, "second");

        let others = self::server(service, create_employee());
        let body: ApiResponse<Vec<IncidentResponseDto>> =
            others.get("/api/incidents").await.json();
        assert_eq!(body.meta.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_get_unknown_and_malformed_id() {
        let server = server(service(), create_employee());

        server
            .get(&format!("/api/incidents/{}", Uuid::now_v7()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/api/incidents/not-a-uuid")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_follows_workflow() {
        let service = service();
        let reporter = create_employee();
        let reporter_server = server(service.clone(), reporter);

        let form = MultipartForm::new()
            .add_text("description", "Door fault car 3")
            .add_text("status", "PENDING_CAPTAIN");
        let created: ApiResponse<IncidentResponseDto> = reporter_server
            .post("/api/incidents")
            .multipart(form)
            .await
            .json();
        let id = created.data.unwrap().id;
        let path = format!("/api/incidents/{}", id);

        // Reporters cannot touch a submitted incident
        reporter_server
            .put(&path)
            .json(&json!({ "description": "changed" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let captain = create_captain();
        let captain_server = server(service, captain.clone());

        captain_server
            .put(&path)
            .json(&json!({ "status": "APPROVED" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        captain_server
            .put(&path)
            .json(&json!({ "status": "PENDING_ADMIN", "expectedStatus": "DRAFT" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let response = captain_server
            .put(&path)
            .json(&json!({ "status": "PENDING_ADMIN", "captainComment": "checked" }))
            .await;
        response.assert_status_ok();
        let body: ApiResponse<IncidentResponseDto> = response.json();
        let incident = body.data.unwrap();
        assert_eq!(incident.status, IncidentStatus::PendingAdmin);
        assert_eq!(incident.approver_id, Some(captain.id));
        assert_eq!(incident.captain_comment.as_deref(), Some("checked"));
        assert_eq!(incident.admin_comment, None);
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_body() {
        let server = server(service(), create_employee());
        server
            .put(&format!("/api/incidents/{}", Uuid::now_v7()))
            .json(&json!({ "status": "ARCHIVED" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
