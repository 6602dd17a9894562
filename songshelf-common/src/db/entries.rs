//! Song and post persistence

use crate::db::models::{normalize_name, AttributeKind, Author, Entry, EntryKind, User};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sort order applied to entry listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// `created_at` descending
    Newest,
    /// `upvotes` descending
    MostUpvoted,
}

/// Row-level restrictions for an entry listing
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Case-insensitive substring matched against title, body and (songs) artist names
    pub search: Option<String>,
    /// Only entries with no comments
    pub uncommented: bool,
    /// Only songs carrying this usage category
    pub usage_id: Option<Uuid>,
}

/// Lowercased title and body stored alongside an entry for search
///
/// SQLite's `LIKE` only folds ASCII case, so matching runs against text
/// already lowercased with Unicode rules.
pub fn search_key(title: &str, body: &str) -> String {
    format!("{}\u{1f}{}", title.to_lowercase(), body.to_lowercase())
}

fn parse_guid(what: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Bad {} id {}: {}", what, value, e)))
}

fn parse_reference_list(kind: AttributeKind, json: &str) -> Result<Vec<Uuid>> {
    serde_json::from_str(json)
        .map_err(|e| Error::Internal(format!("Corrupt {} reference list: {}", kind, e)))
}

/// Comma-separated column list for selecting a full entry row
fn select_columns(kind: EntryKind, alias: &str) -> String {
    let mut columns = format!(
        "{a}.guid, {a}.title, {a}.{body} AS body, {a}.author_id, {a}.views, {a}.upvotes, \
         {a}.downvotes, {a}.comments, {a}.created_at, {a}.updated_at",
        a = alias,
        body = kind.body_column(),
    );
    for attribute_kind in kind.attribute_kinds() {
        columns.push_str(&format!(", {}.{}", alias, attribute_kind.reference_column()));
    }
    columns
}

fn entry_from_row(kind: EntryKind, row: &SqliteRow) -> Result<Entry> {
    let guid: String = row.try_get("guid")?;
    let author_id: String = row.try_get("author_id")?;

    let mut references = BTreeMap::new();
    for attribute_kind in kind.attribute_kinds() {
        let json: String = row.try_get(attribute_kind.reference_column())?;
        references.insert(*attribute_kind, parse_reference_list(*attribute_kind, &json)?);
    }

    Ok(Entry {
        id: parse_guid(&kind.to_string(), &guid)?,
        kind,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: parse_guid("user", &author_id)?,
        views: row.try_get("views")?,
        upvotes: row.try_get("upvotes")?,
        downvotes: row.try_get("downvotes")?,
        comments: row.try_get("comments")?,
        references,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Insert a new entry with empty reference lists
pub async fn insert_entry(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    title: &str,
    body: &str,
    author_id: Uuid,
) -> Result<Option<Entry>> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let sql = format!(
        "INSERT INTO {table} (guid, title, {body}, search_key, author_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        table = kind.table(),
        body = kind.body_column(),
    );

    let result = sqlx::query(&sql)
        .bind(id.to_string())
        .bind(title)
        .bind(body)
        .bind(search_key(title, body))
        .bind(author_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    load_entry(conn, kind, id).await
}

/// Load an entry by id
pub async fn load_entry(conn: &mut SqliteConnection, kind: EntryKind, id: Uuid) -> Result<Option<Entry>> {
    let sql = format!(
        "SELECT {columns} FROM {table} e WHERE e.guid = ?",
        columns = select_columns(kind, "e"),
        table = kind.table(),
    );

    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| entry_from_row(kind, &row)).transpose()
}

/// Persist a new title and body
pub async fn update_fields(conn: &mut SqliteConnection, entry: &Entry) -> Result<()> {
    let sql = format!(
        "UPDATE {table} SET title = ?, {body} = ?, search_key = ?, updated_at = ? WHERE guid = ?",
        table = entry.kind.table(),
        body = entry.kind.body_column(),
    );

    sqlx::query(&sql)
        .bind(&entry.title)
        .bind(&entry.body)
        .bind(search_key(&entry.title, &entry.body))
        .bind(Utc::now())
        .bind(entry.id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Persist every reference list of `entry` in one statement
pub async fn update_references(conn: &mut SqliteConnection, entry: &Entry) -> Result<()> {
    let kind = entry.kind;
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("UPDATE {} SET ", kind.table()));

    for attribute_kind in kind.attribute_kinds() {
        let json = serde_json::to_string(entry.references_of(*attribute_kind))
            .map_err(|e| Error::Internal(format!("Failed to encode reference list: {}", e)))?;
        builder.push(attribute_kind.reference_column()).push(" = ").push_bind(json).push(", ");
    }

    builder
        .push("updated_at = ")
        .push_bind(Utc::now())
        .push(" WHERE guid = ")
        .push_bind(entry.id.to_string());

    builder.build().execute(&mut *conn).await?;

    Ok(())
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_where(builder: &mut QueryBuilder<'_, Sqlite>, kind: EntryKind, filter: &EntryFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = &filter.search {
        let pattern = escape_like(&normalize_name(search));
        builder
            .push(" AND (e.search_key LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'");

        if kind == EntryKind::Song {
            builder
                .push(
                    " OR EXISTS (SELECT 1 FROM artist_songs j JOIN artists a ON a.guid = j.artist_id \
                     WHERE j.song_id = e.guid AND a.name_key LIKE ",
                )
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        builder.push(")");
    }

    if filter.uncommented {
        builder.push(" AND e.comments = 0");
    }

    if let (Some(usage_id), EntryKind::Song) = (filter.usage_id, kind) {
        builder
            .push(" AND EXISTS (SELECT 1 FROM usage_songs u WHERE u.song_id = e.guid AND u.usage_id = ")
            .push_bind(usage_id.to_string())
            .push(")");
    }
}

/// Number of entries matching `filter`
pub async fn count_entries(conn: &mut SqliteConnection, kind: EntryKind, filter: &EntryFilter) -> Result<i64> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} e", kind.table()));
    push_where(&mut builder, kind, filter);

    let total = builder.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
    Ok(total)
}

/// One page of entries matching `filter`
///
/// Ties break on insertion order (newest first) so pages never overlap.
pub async fn list_entries(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    filter: &EntryFilter,
    order: SortOrder,
    limit: i64,
    offset: i64,
) -> Result<Vec<Entry>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM {} e",
        select_columns(kind, "e"),
        kind.table()
    ));
    push_where(&mut builder, kind, filter);

    builder.push(match order {
        SortOrder::Newest => " ORDER BY e.created_at DESC, e.rowid DESC",
        SortOrder::MostUpvoted => " ORDER BY e.upvotes DESC, e.rowid DESC",
    });
    builder.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

    let rows = builder.build().fetch_all(&mut *conn).await?;
    rows.iter().map(|row| entry_from_row(kind, row)).collect()
}

/// Load the public author fields for a user
pub async fn load_author(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Option<Author>> {
    let row = sqlx::query("SELECT guid, name, image FROM users WHERE guid = ?")
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let guid: String = row.try_get("guid")?;
            Ok(Some(Author {
                id: parse_guid("user", &guid)?,
                name: row.try_get("name")?,
                image: row.try_get("image")?,
            }))
        }
        None => Ok(None),
    }
}

/// Provision a user row
///
/// Accounts are owned by the external auth layer; this exists for seeding and tests.
pub async fn create_user(pool: &SqlitePool, name: &str, username: &str, image: Option<&str>) -> Result<User> {
    let id = Uuid::new_v4();

    sqlx::query("INSERT INTO users (guid, name, username, image) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(username)
        .bind(image)
        .execute(pool)
        .await?;

    Ok(User {
        id,
        name: name.to_string(),
        username: username.to_string(),
        image: image.map(str::to_string),
    })
}

/// Read an integer setting, falling back to `default` when missing or unparsable
pub async fn setting_i64(conn: &mut SqliteConnection, key: &str, default: i64) -> Result<i64> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(value
        .flatten()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default))
}
