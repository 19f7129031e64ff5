//! services/api/src/error.rs
//!
//! Failures that stop the API service before or while it serves requests.

use crate::config::ConfigError;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CORS_ORIGIN '{origin}' is not a valid header value")]
    InvalidCorsOrigin { origin: String },

    #[error("Could not bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server stopped: {0}")]
    Serve(#[source] std::io::Error),
}
