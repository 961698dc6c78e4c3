pub mod dtos;
pub mod handlers;
pub mod models;
pub mod repositories;
mod routes;
pub mod services;

pub use repositories::PgIncidentRepository;
pub use routes::routes;
pub use services::{DetailVisibility, IncidentService};
