//! Post endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use songshelf_common::actions::{self, EditPostParams, GetPostParams, MakePostParams, PaginatedSearchParams};
use songshelf_common::db::EntryWithAttributes;
use songshelf_common::reconcile::EntryPage;

use super::{rejected, CurrentSession, Envelope};
use crate::AppState;

/// GET /api/posts?page=&page_size=&query=&filter=
pub async fn list_posts(
    State(state): State<AppState>,
    session: CurrentSession,
    query: Result<Query<PaginatedSearchParams>, QueryRejection>,
) -> Envelope<EntryPage> {
    let Query(params) = match query {
        Ok(query) => query,
        Err(e) => return rejected("query", e.body_text()),
    };

    Envelope(actions::get_posts(&state.db, session.get(), params).await)
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    session: CurrentSession,
    body: Result<Json<MakePostParams>, JsonRejection>,
) -> Envelope<EntryWithAttributes> {
    let Json(params) = match body {
        Ok(body) => body,
        Err(e) => return rejected("body", e.body_text()),
    };

    Envelope(actions::make_post(&state.db, session.get(), params).await)
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(post_id): Path<String>,
) -> Envelope<EntryWithAttributes> {
    Envelope(actions::get_post(&state.db, session.get(), GetPostParams { post_id }).await)
}

/// PUT /api/posts/:id
pub async fn edit_post(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(post_id): Path<String>,
    body: Result<Json<MakePostParams>, JsonRejection>,
) -> Envelope<EntryWithAttributes> {
    let Json(fields) = match body {
        Ok(body) => body,
        Err(e) => return rejected("body", e.body_text()),
    };

    let params = EditPostParams {
        post_id,
        title: fields.title,
        content: fields.content,
        tags: fields.tags,
    };

    Envelope(actions::edit_post(&state.db, session.get(), params).await)
}
