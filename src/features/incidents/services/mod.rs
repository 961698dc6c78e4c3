mod incident_service;
mod visibility;
pub mod workflow;

pub use incident_service::IncidentService;
pub use visibility::{DetailVisibility, ListScope};
pub use workflow::TransitionRequest;
