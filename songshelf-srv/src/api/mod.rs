//! HTTP API handlers for songshelf-srv

pub mod buildinfo;
pub mod health;
pub mod posts;
pub mod session;
pub mod songs;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use session::{CurrentSession, SESSION_HEADER};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use songshelf_common::actions::{handle_error, ActionResponse};
use songshelf_common::{Error, FieldError};

/// Wrapper turning an action envelope into an HTTP response
pub struct Envelope<T>(pub ActionResponse<T>);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

/// Envelope for a request body or query string axum could not decode
pub(crate) fn rejected<T>(field: &str, reason: impl std::fmt::Display) -> Envelope<T> {
    Envelope(handle_error(Error::validation(vec![FieldError::new(
        field,
        reason.to_string(),
    )])))
}
