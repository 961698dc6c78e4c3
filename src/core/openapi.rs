use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::features::incidents::{dtos as incidents_dtos, handlers as incidents_handlers};
use crate::features::incidents::models::{AttachmentType, IncidentStatus};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        incidents_handlers::create_incident,
        incidents_handlers::list_incidents,
        incidents_handlers::get_incident,
        incidents_handlers::update_incident,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            Role,
            AuthenticatedUser,
            // Incidents
            IncidentStatus,
            AttachmentType,
            incidents_dtos::CreateIncidentForm,
            incidents_dtos::UpdateIncidentDto,
            incidents_dtos::ReporterDto,
            incidents_dtos::AttachmentResponseDto,
            incidents_dtos::IncidentResponseDto,
            ApiResponse<incidents_dtos::IncidentResponseDto>,
            ApiResponse<Vec<incidents_dtos::IncidentResponseDto>>,
        )
    ),
    tags(
        (name = "incidents", description = "Incident reporting and approval workflow"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Metro Ops API",
        version = "0.1.0",
        description = "Incident reporting backend for metro operations staff",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
