//! Action layer
//!
//! Request handlers call these functions with a typed parameter struct and the
//! caller's session. Every action validates its parameters, optionally
//! requires a session, runs the operation and returns an [`ActionResponse`].
//! Failures never escape as `Err`: they are normalized into the error
//! envelope by [`handle_error`].

pub mod posts;
pub mod songs;
pub mod validation;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, warn};
use uuid::Uuid;

pub use posts::{edit_post, get_post, get_posts, make_post, EditPostParams, GetPostParams, MakePostParams};
pub use songs::{add_song, edit_song, get_song, get_songs, AddSongParams, EditSongParams, GetSongParams};
pub use validation::PaginatedSearchParams;
pub use validator::Validate;

/// Authenticated caller, as established by the external auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
}

/// Parameters that passed validation, with the caller's session
#[derive(Debug, Clone)]
pub struct Validated<P> {
    pub params: P,
    pub session: Option<Session>,
}

impl<P> Validated<P> {
    /// Id of the signed-in caller
    pub fn user_id(&self) -> Result<Uuid> {
        self.session
            .map(|s| s.user_id)
            .ok_or_else(|| Error::Unauthorized("sign-in required".to_string()))
    }
}

/// Authorize-and-validate wrapper
///
/// Checks the session first when `require_auth` is set, then runs the
/// parameter rules declared on `P`.
pub fn authorize<P: Validate>(params: P, session: Option<&Session>, require_auth: bool) -> Result<Validated<P>> {
    if require_auth && session.is_none() {
        return Err(Error::Unauthorized("sign-in required".to_string()));
    }

    params.validate()?;

    Ok(Validated {
        params,
        session: session.copied(),
    })
}

/// Error payload of a failed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    /// Field name to failed rule messages (validation errors only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Vec<String>>>,
}

/// Uniform action result envelope
///
/// Success: `{success: true, data}`.
/// Failure: `{success: false, error: {message, details?}, status?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: None,
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => handle_error(e),
        }
    }

    /// HTTP status for this envelope (200 on success)
    pub fn http_status(&self) -> u16 {
        match (self.success, self.status) {
            (true, _) => 200,
            (false, Some(status)) => status,
            (false, None) => 500,
        }
    }
}

/// Normalize any failure into the error envelope
pub fn handle_error<T>(err: Error) -> ActionResponse<T> {
    let status = err.status();
    if status >= 500 {
        error!("Action failed: {}", err);
    } else {
        warn!("Action rejected ({}): {}", status, err);
    }

    let details = match &err {
        Error::Validation { fields, .. } => {
            let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for field in fields {
                map.entry(field.field.clone()).or_default().push(field.message.clone());
            }
            Some(map)
        }
        _ => None,
    };

    let message = match err {
        Error::Validation { message, .. } => message,
        Error::NotFound(what) => format!("{} not found", capitalize(&what)),
        Error::Unauthorized(_) => "Unauthorized".to_string(),
        other => other.to_string(),
    };

    ActionResponse {
        success: false,
        data: None,
        error: Some(ErrorBody { message, details }),
        status: Some(status),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldError;

    #[derive(Debug)]
    struct AlwaysValid;

    impl Validate for AlwaysValid {
        fn validate(&self) -> std::result::Result<(), validator::ValidationErrors> {
            Ok(())
        }
    }

    #[test]
    fn test_authorize_requires_session() {
        let err = authorize(AlwaysValid, None, true).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_authorize_passes_session_through() {
        let session = Session { user_id: Uuid::new_v4() };
        let validated = authorize(AlwaysValid, Some(&session), true).unwrap();
        assert_eq!(validated.user_id().unwrap(), session.user_id);
    }

    #[test]
    fn test_authorize_without_auth_allows_anonymous() {
        let validated = authorize(AlwaysValid, None, false).unwrap();
        assert!(validated.session.is_none());
        assert!(validated.user_id().is_err());
    }

    #[test]
    fn test_handle_error_validation_details() {
        let response: ActionResponse<()> = handle_error(Error::validation(vec![
            FieldError::new("tags", "at most 3 items"),
            FieldError::new("tags", "'x' is a duplicate"),
            FieldError::new("title", "too short"),
        ]));

        assert!(!response.success);
        assert_eq!(response.status, Some(400));
        let details = response.error.unwrap().details.unwrap();
        assert_eq!(details["tags"].len(), 2);
        assert_eq!(details["title"], vec!["too short".to_string()]);
    }

    #[test]
    fn test_handle_error_messages() {
        let not_found: ActionResponse<()> = handle_error(Error::NotFound("song 42".into()));
        assert_eq!(not_found.error.unwrap().message, "Song 42 not found");
        assert_eq!(not_found.status, Some(404));

        let unauthorized: ActionResponse<()> = handle_error(Error::Unauthorized("user x does not own song y".into()));
        assert_eq!(unauthorized.error.as_ref().unwrap().message, "Unauthorized");
        assert_eq!(unauthorized.http_status(), 401);
    }

    #[test]
    fn test_envelope_serialization() {
        let ok = serde_json::to_value(ActionResponse::ok(5)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 5}));

        let failed: ActionResponse<i32> = handle_error(Error::Internal("boom".into()));
        let value = serde_json::to_value(failed).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["status"], 500);
        assert_eq!(value["error"]["message"], "Internal error: boom");
        assert!(value.get("data").is_none());
    }
}
