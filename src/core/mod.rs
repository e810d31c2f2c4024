//! Core utilities: configuration, errors, and the health check server.

pub mod config;
pub mod error;
pub mod web_server;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
