//! Post actions

use super::validation::{not_blank, tag_names, valid_id, PaginatedSearchParams, TAGS_MAX, TITLE_MAX, TITLE_MIN};
use super::{authorize, ActionResponse, Session};
use crate::db::models::{AttributeKind, EntryKind, EntryWithAttributes};
use crate::reconcile::{self, AttributeLists, EntryDraft, EntryFields, EntryPage};
use crate::uuid_utils;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MakePostParams {
    #[validate(
        length(min = TITLE_MIN, max = TITLE_MAX, message = "must be between 5 and 130 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = TAGS_MAX, message = "must contain between 1 and 3 items"),
        custom(function = "tag_names")
    )]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EditPostParams {
    #[validate(custom(function = "valid_id"))]
    pub post_id: String,
    #[validate(
        length(min = TITLE_MIN, max = TITLE_MAX, message = "must be between 5 and 130 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = TAGS_MAX, message = "must contain between 1 and 3 items"),
        custom(function = "tag_names")
    )]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GetPostParams {
    #[validate(custom(function = "valid_id"))]
    pub post_id: String,
}

pub async fn make_post(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: MakePostParams,
) -> ActionResponse<EntryWithAttributes> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, true)?;
            let p = &validated.params;

            let draft = EntryDraft {
                title: p.title.trim().to_string(),
                body: p.content.clone(),
                owner_id: validated.user_id()?,
            };
            let lists = AttributeLists::new().with(AttributeKind::Tag, p.tags.clone());

            reconcile::create_with_attributes(pool, EntryKind::Post, &draft, &lists).await
        }
        .await,
    )
}

pub async fn edit_post(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: EditPostParams,
) -> ActionResponse<EntryWithAttributes> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, true)?;
            let p = &validated.params;

            let post_id = uuid_utils::parse_field("post_id", &p.post_id)?;
            let fields = EntryFields {
                title: p.title.trim().to_string(),
                body: p.content.clone(),
            };
            let lists = AttributeLists::new().with(AttributeKind::Tag, p.tags.clone());

            reconcile::edit_with_attributes(pool, EntryKind::Post, post_id, &fields, &lists, validated.user_id()?).await
        }
        .await,
    )
}

pub async fn get_post(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: GetPostParams,
) -> ActionResponse<EntryWithAttributes> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, true)?;
            let post_id = uuid_utils::parse_field("post_id", &validated.params.post_id)?;

            reconcile::fetch_with_attributes(pool, EntryKind::Post, post_id).await
        }
        .await,
    )
}

pub async fn get_posts(
    pool: &SqlitePool,
    session: Option<&Session>,
    params: PaginatedSearchParams,
) -> ActionResponse<EntryPage> {
    ActionResponse::from_result(
        async {
            let validated = authorize(params, session, false)?;
            reconcile::list_paginated(pool, EntryKind::Post, &validated.params.into()).await
        }
        .await,
    )
}
