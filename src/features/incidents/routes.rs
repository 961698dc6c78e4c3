use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::features::incidents::handlers::{self, IncidentState};
use crate::features::incidents::services::IncidentService;

/// Create routes for the incidents feature
///
/// All routes require the auth middleware, applied by the caller.
/// `max_attachment_size` is the largest single attachment a new report may carry.
pub fn routes(incident_service: Arc<IncidentService>, max_attachment_size: usize) -> Router {
    let state = IncidentState { incident_service };

    Router::new()
        .route(
            "/api/incidents",
            get(handlers::list_incidents)
                .post(handlers::create_incident)
                // Allow the largest attachment plus a buffer for multipart overhead
                .layer(DefaultBodyLimit::max(max_attachment_size + 1024 * 1024)),
        )
        .route(
            "/api/incidents/{id}",
            get(handlers::get_incident).put(handlers::update_incident),
        )
        .with_state(state)
}
