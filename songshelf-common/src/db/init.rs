//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas
//! (foreign keys, WAL, busy timeout) to every pooled connection and creates
//! all tables idempotently.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default page size for entry listings
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Upper bound for a requested page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Uses a single connection that is never recycled, since every SQLite
/// `:memory:` connection is a separate database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and default settings (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_settings_table(pool).await?;

    // Entry tables
    create_songs_table(pool).await?;
    create_posts_table(pool).await?;

    // Attribute tables
    create_attribute_table(pool, "tags", "", "").await?;
    create_attribute_table(pool, "artists", "image TEXT,", "").await?;
    create_attribute_table(
        pool,
        "usages",
        "",
        ", CHECK (name_key IN ('commercial', 'non-commercial', 'commercial-official', 'non-commercial-official'))",
    )
    .await?;

    // Linking tables
    create_join_table(pool, "tag_songs", "tag_id", "tags", "song_id", "songs").await?;
    create_join_table(pool, "artist_songs", "artist_id", "artists", "song_id", "songs").await?;
    create_join_table(pool, "usage_songs", "usage_id", "usages", "song_id", "songs").await?;
    create_join_table(pool, "tag_posts", "tag_id", "tags", "post_id", "posts").await?;

    init_default_settings(pool).await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            image TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            notes TEXT NOT NULL,
            search_key TEXT NOT NULL DEFAULT '',
            author_id TEXT NOT NULL REFERENCES users(guid),
            tags TEXT NOT NULL DEFAULT '[]',
            artists TEXT NOT NULL DEFAULT '[]',
            usage TEXT NOT NULL DEFAULT '[]',
            views INTEGER NOT NULL DEFAULT 0,
            upvotes INTEGER NOT NULL DEFAULT 0,
            downvotes INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_created_at ON songs(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_posts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            search_key TEXT NOT NULL DEFAULT '',
            author_id TEXT NOT NULL REFERENCES users(guid),
            tags TEXT NOT NULL DEFAULT '[]',
            views INTEGER NOT NULL DEFAULT 0,
            upvotes INTEGER NOT NULL DEFAULT 0,
            downvotes INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Attribute tables share one shape: display name, unique normalized key and
/// one reference counter per entry kind.
async fn create_attribute_table(
    pool: &SqlitePool,
    table: &str,
    extra_columns: &str,
    constraints: &str,
) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL UNIQUE,
            songs INTEGER NOT NULL DEFAULT 0,
            posts INTEGER NOT NULL DEFAULT 0,
            {extra_columns}
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            {constraints}
        )
        "#
    );

    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

async fn create_join_table(
    pool: &SqlitePool,
    table: &str,
    attribute_column: &str,
    attribute_table: &str,
    entry_column: &str,
    entry_table: &str,
) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            {attribute_column} TEXT NOT NULL REFERENCES {attribute_table}(guid),
            {entry_column} TEXT NOT NULL REFERENCES {entry_table}(guid),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY ({attribute_column}, {entry_column})
        )
        "#
    );
    sqlx::query(&sql).execute(pool).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_{entry_column} ON {table}({entry_column})"
    );
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}

/// Initialize or update default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "default_page_size", &DEFAULT_PAGE_SIZE.to_string()).await?;
    ensure_setting(pool, "max_page_size", &MAX_PAGE_SIZE.to_string()).await?;

    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE handles concurrent initialization
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;

            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;

            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
