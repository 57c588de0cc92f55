//! Error types for Partkeeper Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Configuration errors
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    // Store errors
    #[error("Partition store error: {0}")]
    Store(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, Error>;
