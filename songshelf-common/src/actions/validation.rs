//! Request parameter rules
//!
//! Limits are declared on the parameter structs with `#[validate(...)]`;
//! the helpers here cover what the built-in validators cannot express.

use crate::db::models::normalize_name;
use crate::reconcile::{ListQuery, USAGE_CATEGORIES};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use validator::{Validate, ValidationError};

pub const TITLE_MIN: u64 = 5;
pub const TITLE_MAX: u64 = 130;
pub const TAGS_MAX: u64 = 3;
pub const TAG_NAME_MAX: usize = 15;
pub const ARTISTS_MAX: u64 = 5;
pub const ARTIST_NAME_MAX: usize = 50;
pub const USAGE_MAX: u64 = 4;
/// Highest page number a listing accepts
pub const PAGE_MAX: i64 = 1_000_000;

fn failure(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

/// Non-empty once surrounding whitespace is removed
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(failure("blank", "must not be blank".to_string()));
    }
    Ok(())
}

/// Value parses as an id
pub(crate) fn valid_id(value: &str) -> Result<(), ValidationError> {
    if uuid::Uuid::parse_str(value.trim()).is_err() {
        return Err(failure("id", "must be a valid id".to_string()));
    }
    Ok(())
}

/// Attribute names: none blank, none too long, no case-insensitive duplicates
fn names(values: &[String], max_len: usize) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for value in values {
        let trimmed = value.trim();
        let len = trimmed.chars().count();
        if len == 0 {
            return Err(failure("blank", "must not contain blank names".to_string()));
        }
        if len > max_len {
            return Err(failure(
                "name_length",
                format!("'{}' is longer than {} characters", trimmed, max_len),
            ));
        }
        if !seen.insert(normalize_name(value)) {
            return Err(failure("duplicate", format!("'{}' is a duplicate", trimmed)));
        }
    }
    Ok(())
}

pub(crate) fn tag_names(tags: &[String]) -> Result<(), ValidationError> {
    names(tags, TAG_NAME_MAX)
}

pub(crate) fn artist_names(artists: &[String]) -> Result<(), ValidationError> {
    names(artists, ARTIST_NAME_MAX)
}

/// Known usage categories only, compared case-insensitively
pub(crate) fn usage_categories(usage: &[String]) -> Result<(), ValidationError> {
    names(usage, usize::MAX)?;
    for value in usage {
        if !USAGE_CATEGORIES.contains(&normalize_name(value).as_str()) {
            return Err(failure(
                "usage",
                format!("'{}' must be one of: {}", value.trim(), USAGE_CATEGORIES.join(", ")),
            ));
        }
    }
    Ok(())
}

/// Listing parameters shared by songs and posts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PaginatedSearchParams {
    #[validate(range(min = 1, max = PAGE_MAX, message = "must be between 1 and 1000000"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub page_size: Option<i64>,
    pub query: Option<String>,
    pub filter: Option<String>,
}

impl From<PaginatedSearchParams> for ListQuery {
    fn from(params: PaginatedSearchParams) -> Self {
        ListQuery {
            query: params.query,
            filter: params.filter,
            page: params.page.unwrap_or(1),
            page_size: params.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FieldError};

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn failed_fields<V: Validate>(params: &V) -> Vec<FieldError> {
        match params.validate().map_err(Error::from) {
            Err(Error::Validation { fields, .. }) => fields,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_names_limits() {
        assert!(tag_names(&strings(&["a", "b", "c"])).is_ok());
        assert!(tag_names(&strings(&["sixteen-chars-xx"])).is_err());
        assert!(tag_names(&strings(&["ok", "  "])).is_err());
        // 15 characters, 30 bytes
        assert!(tag_names(&strings(&["ééééééééééééééé"])).is_ok());
    }

    #[test]
    fn test_names_reject_case_insensitive_duplicates() {
        let err = artist_names(&strings(&["Nujabes", "nujabes "])).unwrap_err();
        assert_eq!(err.code, "duplicate");
        assert!(err.message.unwrap().contains("Nujabes"));
    }

    #[test]
    fn test_usage_must_be_known_category() {
        assert!(usage_categories(&strings(&["Commercial", "non-commercial"])).is_ok());
        assert!(usage_categories(&strings(&["personal"])).is_err());
        assert!(usage_categories(&strings(&["commercial", "COMMERCIAL"])).is_err());
    }

    #[test]
    fn test_valid_id_and_not_blank() {
        assert!(valid_id(&uuid::Uuid::new_v4().to_string()).is_ok());
        assert!(valid_id("nope").is_err());
        assert!(not_blank(" x ").is_ok());
        assert!(not_blank("   ").is_err());
    }

    #[test]
    fn test_paginated_params() {
        assert!(PaginatedSearchParams::default().validate().is_ok());

        let params = PaginatedSearchParams {
            page: Some(0),
            page_size: Some(-1),
            ..Default::default()
        };
        let fields: Vec<String> = failed_fields(&params).into_iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["page", "page_size"]);

        let query: ListQuery = PaginatedSearchParams {
            page_size: Some(5),
            filter: Some("popular".into()),
            ..Default::default()
        }
        .into();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, Some(5));
    }

    #[test]
    fn test_paginated_params_reject_huge_page() {
        let params = PaginatedSearchParams {
            page: Some(i64::MAX),
            ..Default::default()
        };
        let fields = failed_fields(&params);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "page");

        let last = PaginatedSearchParams {
            page: Some(PAGE_MAX),
            ..Default::default()
        };
        assert!(last.validate().is_ok());
    }
}
