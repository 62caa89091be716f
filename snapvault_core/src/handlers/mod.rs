//! HTTP handlers and route table

pub mod files;
pub mod health;
pub mod routes;
pub mod sessions;

pub use routes::create_routes;
