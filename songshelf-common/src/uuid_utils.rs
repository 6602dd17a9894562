//! UUID utilities

use uuid::Uuid;

use crate::{Error, FieldError, Result};

/// Parse UUID from string
pub fn parse(s: &str) -> std::result::Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// Parse a request id field, reporting failures as a validation error on `field`
pub fn parse_field(field: &str, s: &str) -> Result<Uuid> {
    parse(s.trim()).map_err(|_| Error::validation(vec![FieldError::new(field, "must be a valid id")]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_rejects_garbage() {
        let err = parse_field("song_id", "not-a-uuid").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_parse_field_trims() {
        let id = Uuid::new_v4();
        assert_eq!(parse_field("song_id", &format!(" {} ", id)).unwrap(), id);
    }
}
