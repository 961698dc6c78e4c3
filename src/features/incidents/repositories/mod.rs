mod incident_repository;
mod pg_incident_repository;

#[cfg(test)]
pub mod memory;

pub use incident_repository::IncidentRepository;
pub use pg_incident_repository::PgIncidentRepository;
