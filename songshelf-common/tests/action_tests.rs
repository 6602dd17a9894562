//! Integration tests for the action layer
//!
//! Covers the session requirement, parameter validation and the response
//! envelope for song and post actions.

use songshelf_common::actions::{
    add_song, edit_post, edit_song, get_post, get_posts, get_song, get_songs, make_post, AddSongParams,
    EditPostParams, EditSongParams, GetPostParams, GetSongParams, MakePostParams, PaginatedSearchParams, Session,
};
use songshelf_common::db::entries::create_user;
use songshelf_common::db::{open_in_memory, AttributeKind};
use sqlx::SqlitePool;

async fn setup() -> (SqlitePool, Session) {
    let pool = open_in_memory().await.expect("in-memory database");
    let user = create_user(&pool, "Grace", "grace", Some("https://img.example/grace.png"))
        .await
        .expect("user");
    (pool, Session { user_id: user.id })
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn song_params(title: &str) -> AddSongParams {
    AddSongParams {
        title: title.to_string(),
        notes: "Some notes".to_string(),
        tags: strings(&["Ambient"]),
        artists: strings(&["Brian Eno"]),
        usage: strings(&["non-commercial"]),
    }
}

fn edit_params(song_id: String, add: AddSongParams) -> EditSongParams {
    EditSongParams {
        song_id,
        title: add.title,
        notes: add.notes,
        tags: add.tags,
        artists: add.artists,
        usage: add.usage,
    }
}

#[tokio::test]
async fn test_add_song_requires_session() {
    let (pool, _session) = setup().await;

    let response = add_song(&pool, None, song_params("Music for Airports")).await;

    assert!(!response.success);
    assert_eq!(response.status, Some(401));
    assert_eq!(response.error.unwrap().message, "Unauthorized");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_add_song_validation_details() {
    let (pool, session) = setup().await;

    let params = AddSongParams {
        title: "Abc".to_string(),
        tags: strings(&["one", "two", "three", "four"]),
        usage: strings(&["personal"]),
        ..song_params("unused")
    };
    let response = add_song(&pool, Some(&session), params).await;

    assert_eq!(response.status, Some(400));
    let details = response.error.unwrap().details.expect("field details");
    assert!(details.contains_key("title"));
    assert!(details.contains_key("tags"));
    assert!(details.contains_key("usage"));
    assert!(!details.contains_key("artists"));
}

#[tokio::test]
async fn test_add_and_get_song() {
    let (pool, session) = setup().await;

    let created = add_song(&pool, Some(&session), song_params("Music for Airports")).await;
    assert!(created.success, "{:?}", created.error);
    let song = created.data.unwrap();
    assert_eq!(song.names_of(AttributeKind::Artist), vec!["Brian Eno"]);

    let fetched = get_song(
        &pool,
        Some(&session),
        GetSongParams {
            song_id: song.entry.id.to_string(),
        },
    )
    .await;
    assert!(fetched.success);
    let fetched = fetched.data.unwrap();
    assert_eq!(fetched.entry.title, "Music for Airports");
    assert_eq!(
        fetched.author.unwrap().image.as_deref(),
        Some("https://img.example/grace.png")
    );
}

#[tokio::test]
async fn test_get_song_errors() {
    let (pool, session) = setup().await;

    let bad_id = get_song(&pool, Some(&session), GetSongParams { song_id: "nope".into() }).await;
    assert_eq!(bad_id.status, Some(400));

    let missing = get_song(
        &pool,
        Some(&session),
        GetSongParams {
            song_id: uuid::Uuid::new_v4().to_string(),
        },
    )
    .await;
    assert_eq!(missing.status, Some(404));
    assert!(missing.error.unwrap().message.starts_with("Song "));
}

#[tokio::test]
async fn test_edit_song_by_other_user_is_unauthorized() {
    let (pool, owner) = setup().await;
    let other = create_user(&pool, "Linus", "linus", None).await.unwrap();
    let other = Session { user_id: other.id };

    let song = add_song(&pool, Some(&owner), song_params("Owned by Grace")).await.data.unwrap();

    let response = edit_song(
        &pool,
        Some(&other),
        edit_params(song.entry.id.to_string(), song_params("Taken by Linus")),
    )
    .await;
    assert_eq!(response.status, Some(401));

    let response = edit_song(
        &pool,
        Some(&owner),
        edit_params(song.entry.id.to_string(), song_params("Renamed by Grace")),
    )
    .await;
    assert!(response.success);
    assert_eq!(response.data.unwrap().entry.title, "Renamed by Grace");
}

#[tokio::test]
async fn test_get_songs_is_public() {
    let (pool, session) = setup().await;
    for i in 0..3 {
        add_song(&pool, Some(&session), song_params(&format!("Public song {}", i))).await;
    }

    let response = get_songs(
        &pool,
        None,
        PaginatedSearchParams {
            page: Some(1),
            page_size: Some(2),
            ..Default::default()
        },
    )
    .await;

    assert!(response.success);
    let page = response.data.unwrap();
    assert_eq!(page.entries.len(), 2);
    assert!(page.is_next);

    let invalid = get_songs(
        &pool,
        None,
        PaginatedSearchParams {
            page: Some(0),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(invalid.status, Some(400));

    let huge = get_songs(
        &pool,
        None,
        PaginatedSearchParams {
            page: Some(i64::MAX),
            page_size: Some(10),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(huge.status, Some(400));
    assert!(huge.error.unwrap().details.unwrap().contains_key("page"));
}

#[tokio::test]
async fn test_post_actions() {
    let (pool, session) = setup().await;

    let made = make_post(
        &pool,
        Some(&session),
        MakePostParams {
            title: "How do lifetimes work?".to_string(),
            content: "Asking for a friend".to_string(),
            tags: strings(&["rust", "Lifetimes"]),
        },
    )
    .await;
    assert!(made.success, "{:?}", made.error);
    let post = made.data.unwrap();

    let edited = edit_post(
        &pool,
        Some(&session),
        EditPostParams {
            post_id: post.entry.id.to_string(),
            title: post.entry.title.clone(),
            content: "Asking for myself".to_string(),
            tags: strings(&["Rust"]),
        },
    )
    .await;
    assert!(edited.success);
    let edited = edited.data.unwrap();
    assert_eq!(edited.entry.body, "Asking for myself");
    assert_eq!(edited.names_of(AttributeKind::Tag), vec!["rust"]);

    let fetched = get_post(
        &pool,
        None,
        GetPostParams {
            post_id: post.entry.id.to_string(),
        },
    )
    .await;
    assert_eq!(fetched.status, Some(401));

    let listed = get_posts(
        &pool,
        None,
        PaginatedSearchParams {
            query: Some("LIFETIMES".into()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(listed.data.unwrap().entries.len(), 1);
}

#[tokio::test]
async fn test_make_post_rejects_duplicate_tags() {
    let (pool, session) = setup().await;

    let response = make_post(
        &pool,
        Some(&session),
        MakePostParams {
            title: "Duplicate tags".to_string(),
            content: "body".to_string(),
            tags: strings(&["Rust", "rust"]),
        },
    )
    .await;

    assert_eq!(response.status, Some(400));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0);
}
