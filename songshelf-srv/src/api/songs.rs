//! Song endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use songshelf_common::actions::{self, AddSongParams, EditSongParams, GetSongParams, PaginatedSearchParams};
use songshelf_common::db::EntryWithAttributes;
use songshelf_common::reconcile::EntryPage;

use super::{rejected, CurrentSession, Envelope};
use crate::AppState;

/// GET /api/songs?page=&page_size=&query=&filter=
pub async fn list_songs(
    State(state): State<AppState>,
    session: CurrentSession,
    query: Result<Query<PaginatedSearchParams>, QueryRejection>,
) -> Envelope<EntryPage> {
    let Query(params) = match query {
        Ok(query) => query,
        Err(e) => return rejected("query", e.body_text()),
    };

    Envelope(actions::get_songs(&state.db, session.get(), params).await)
}

/// POST /api/songs
pub async fn create_song(
    State(state): State<AppState>,
    session: CurrentSession,
    body: Result<Json<AddSongParams>, JsonRejection>,
) -> Envelope<EntryWithAttributes> {
    let Json(params) = match body {
        Ok(body) => body,
        Err(e) => return rejected("body", e.body_text()),
    };

    Envelope(actions::add_song(&state.db, session.get(), params).await)
}

/// GET /api/songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(song_id): Path<String>,
) -> Envelope<EntryWithAttributes> {
    Envelope(actions::get_song(&state.db, session.get(), GetSongParams { song_id }).await)
}

/// PUT /api/songs/:id
///
/// Body carries the full replacement title, notes and attribute lists.
pub async fn edit_song(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(song_id): Path<String>,
    body: Result<Json<AddSongParams>, JsonRejection>,
) -> Envelope<EntryWithAttributes> {
    let Json(fields) = match body {
        Ok(body) => body,
        Err(e) => return rejected("body", e.body_text()),
    };

    let params = EditSongParams {
        song_id,
        title: fields.title,
        notes: fields.notes,
        tags: fields.tags,
        artists: fields.artists,
        usage: fields.usage,
    };

    Envelope(actions::edit_song(&state.db, session.get(), params).await)
}
