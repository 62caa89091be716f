pub mod clock;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use clock::*;
pub use errors::*;
pub use jwt::*;
pub use models::*;
pub use repository::*;
pub use service::*;
