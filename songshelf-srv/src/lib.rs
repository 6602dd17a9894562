//! songshelf-srv library - HTTP surface for the Songshelf catalog
//!
//! Routes map one-to-one onto the action layer in `songshelf_common::actions`.
//! Handlers return the action envelope as JSON with the envelope's status.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let songs = Router::new()
        .route("/api/songs", get(api::songs::list_songs).post(api::songs::create_song))
        .route("/api/songs/:id", get(api::songs::get_song).put(api::songs::edit_song));

    let posts = Router::new()
        .route("/api/posts", get(api::posts::list_posts).post(api::posts::create_post))
        .route("/api/posts/:id", get(api::posts::get_post).put(api::posts::edit_post));

    Router::new()
        .merge(songs)
        .merge(posts)
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
