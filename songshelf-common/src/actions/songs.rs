//! Song actions

use super::validation::{
    artist_names, not_blank, tag_names, usage_categories, valid_id, PaginatedSearchParams, ARTISTS_MAX, TAGS_MAX,
    TITLE_MAX, TITLE_MIN, USAGE_MAX,
};
use super::{authorize, ActionResponse, Session};
use crate::db::models::{AttributeKind, EntryKind, EntryWithAttributes};
use crate::reconcile::{self, AttributeLists, EntryDraft, EntryFields, EntryPage};
use crate::uuid_utils;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AddSongParams {
    #[validate(
        length(min = TITLE_MIN, max = TITLE_MAX, message = "must be between 5 and 130 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub notes: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = TAGS_MAX, message = "must contain between 1 and 3 items"),
        custom(function = "tag_names")
    )]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, max = ARTISTS_MAX, message = "must contain between 1 and 5 items"),
        custom(function = "artist_names")
    )]
    pub artists: Vec<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, max = USAGE_MAX, message = "must contain between 1 and 4 items"),
        custom(function = "usage_categories")
    )]
    pub usage: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EditSongParams {
    #[validate(custom(function = "valid_id"))]
    pub song_id: String,
    #[validate(
        length(min = TITLE_MIN, max = TITLE_MAX, message = "must be between 5 and 130 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub notes: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = TAGS_MAX, message = "must contain between 1 and 3 items"),
        custom(function = "tag_names")
    )]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, max = ARTISTS_MAX, message = "must contain between 1 and 5 items"),
        custom(function = "artist_names")
    )]
    pub artists: Vec<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, max = USAGE_MAX, message = "must contain between 1 and 4 items"),
        custom(function = "usage_categories")
    )]
    pub usage: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GetSongParams {
    #[validate(custom(function = "valid_id"))]
    pub song_id: String,
}

fn song_lists(tags: &[String], artists: &[String], usage: &[String]) -> AttributeLists {
    AttributeLists::new()
        .with(AttributeKind::Tag, tags.to_vec())
        .with(AttributeKind::Artist, artists.to_vec())
        .with(AttributeKind::Usage, usage.to_vec())
}

/// Create a song owned by the caller
pub async fn add_song(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: AddSongParams,
) -> ActionResponse<EntryWithAttributes> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, true)?;
            let p = &validated.params;

            let draft = EntryDraft {
                title: p.title.trim().to_string(),
                body: p.notes.clone(),
                owner_id: validated.user_id()?,
            };
            let lists = song_lists(&p.tags, &p.artists, &p.usage);

            reconcile::create_with_attributes(pool, EntryKind::Song, &draft, &lists).await
        }
        .await,
    )
}

/// Edit a song owned by the caller
pub async fn edit_song(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: EditSongParams,
) -> ActionResponse<EntryWithAttributes> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, true)?;
            let p = &validated.params;

            let song_id = uuid_utils::parse_field("song_id", &p.song_id)?;
            let fields = EntryFields {
                title: p.title.trim().to_string(),
                body: p.notes.clone(),
            };
            let lists = song_lists(&p.tags, &p.artists, &p.usage);

            reconcile::edit_with_attributes(pool, EntryKind::Song, song_id, &fields, &lists, validated.user_id()?).await
        }
        .await,
    )
}

/// Fetch one song with its tags, artists, usage categories and author
pub async fn get_song(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: GetSongParams,
) -> ActionResponse<EntryWithAttributes> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, true)?;
            let song_id = uuid_utils::parse_field("song_id", &validated.params.song_id)?;

            reconcile::fetch_with_attributes(pool, EntryKind::Song, song_id).await
        }
        .await,
    )
}

/// List songs; no session required
pub async fn get_songs(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: PaginatedSearchParams,
) -> ActionResponse<EntryPage> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, false)?;
            reconcile::list_paginated(pool, EntryKind::Song, &validated.params.into()).await
        }
        .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn valid_song() -> AddSongParams {
        AddSongParams {
            title: "Aruarian Dance".into(),
            notes: "Late night loop".into(),
            tags: strings(&["lofi", "jazz"]),
            artists: strings(&["Nujabes"]),
            usage: strings(&["non-commercial"]),
        }
    }

    #[test]
    fn test_add_song_params_valid() {
        assert!(valid_song().validate().is_ok());
    }

    #[test]
    fn test_add_song_params_need_usage_and_artists() {
        let params = AddSongParams {
            artists: vec![],
            usage: vec![],
            ..valid_song()
        };
        let errors = params.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("artists"));
        assert!(fields.contains_key("usage"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_add_song_params_title_limits() {
        let blank = AddSongParams {
            title: "      ".into(),
            ..valid_song()
        };
        assert!(blank.validate().is_err());

        let long = AddSongParams {
            title: "x".repeat(131),
            ..valid_song()
        };
        assert!(long.validate().is_err());

        // Characters, not bytes
        let accented = AddSongParams {
            title: "é".repeat(130),
            ..valid_song()
        };
        assert!(accented.validate().is_ok());
    }

    #[test]
    fn test_edit_song_params_require_valid_id() {
        let add = valid_song();
        let params = EditSongParams {
            song_id: "42".into(),
            title: add.title,
            notes: add.notes,
            tags: add.tags,
            artists: add.artists,
            usage: add.usage,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_song_params_deserialize_missing_lists_as_empty() {
        let params: AddSongParams = serde_json::from_str(r#"{"title": "Hello world", "notes": "n"}"#).unwrap();
        assert!(params.tags.is_empty());
        assert!(params.validate().is_err());
    }
}
