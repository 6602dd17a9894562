//! Caller session extraction
//!
//! Authentication happens upstream. The auth proxy forwards the signed-in
//! user's id in the `x-songshelf-user` header; requests without it are
//! anonymous.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use songshelf_common::actions::Session;
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

pub const SESSION_HEADER: &str = "x-songshelf-user";

/// Session of the caller, if any
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession(pub Option<Session>);

impl CurrentSession {
    pub fn get(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(SESSION_HEADER) else {
            return Ok(CurrentSession(None));
        };

        let session = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(|user_id| Session { user_id });

        if session.is_none() {
            warn!("Ignoring malformed {} header", SESSION_HEADER);
        }

        Ok(CurrentSession(session))
    }
}
