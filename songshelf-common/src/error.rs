//! Common error types for Songshelf

use serde::Serialize;
use thiserror::Error;

/// Common result type for Songshelf operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed validation rule, keyed by request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Common error types across Songshelf
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error, including transaction aborts (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested entry or attribute not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request parameters failed validation
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    /// Missing session, or acting user is not the entry's owner
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP-style status code used by the response envelope
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::Unauthorized(_) => 401,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        let message = match fields.as_slice() {
            [only] => format!("{}: {}", only.field, only.message),
            _ => format!("{} fields failed validation", fields.len()),
        };
        Error::Validation { message, fields }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut by_field: Vec<_> = errors.field_errors().into_iter().collect();
        by_field.sort_by(|a, b| a.0.cmp(&b.0));

        let fields = by_field
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| {
                    let message = match &failure.message {
                        Some(message) => message.to_string(),
                        None => format!("failed rule '{}'", failure.code),
                    };
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();

        Error::validation(fields)
    }
}
