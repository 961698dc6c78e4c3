pub mod auth;
pub mod incidents;
