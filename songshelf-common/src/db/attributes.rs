//! Attribute and join-record persistence
//!
//! Counter changes are single SQL statements (`n = n + 1`, `n = n - 1`) so
//! concurrent transactions never lose an update.

use crate::db::models::{normalize_name, Attribute, AttributeKind, EntryKind};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn join_table(entry_kind: EntryKind, kind: AttributeKind) -> Result<&'static str> {
    entry_kind
        .join_table(kind)
        .ok_or_else(|| Error::Internal(format!("{}s do not carry {} attributes", entry_kind, kind)))
}

fn attribute_from_row(kind: AttributeKind, row: &SqliteRow) -> Result<Attribute> {
    let guid: String = row.try_get("guid")?;

    Ok(Attribute {
        id: Uuid::parse_str(&guid).map_err(|e| Error::Internal(format!("Bad {} id {}: {}", kind, guid, e)))?,
        kind,
        name: row.try_get("name")?,
        songs: row.try_get("songs")?,
        posts: row.try_get("posts")?,
    })
}

/// Find the attribute named `name` (case-insensitive) or create it, and count
/// one more reference from `entry_kind`
///
/// A created attribute keeps the casing of `name`; an existing one keeps its
/// original casing.
pub async fn upsert_and_increment(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    entry_kind: EntryKind,
    name: &str,
) -> Result<Attribute> {
    let counter = entry_kind.counter_column();
    let sql = format!(
        r#"
        INSERT INTO {table} (guid, name, name_key, {counter})
        VALUES (?, ?, ?, 1)
        ON CONFLICT(name_key) DO UPDATE SET
            {counter} = {counter} + 1,
            updated_at = CURRENT_TIMESTAMP
        RETURNING guid, name, songs, posts
        "#,
        table = kind.table(),
    );

    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(name.trim())
        .bind(normalize_name(name))
        .fetch_one(&mut *conn)
        .await?;

    attribute_from_row(kind, &row)
}

/// Count one fewer reference from `entry_kind` on each attribute in `ids`
pub async fn decrement(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    entry_kind: EntryKind,
    ids: &[Uuid],
) -> Result<()> {
    let counter = entry_kind.counter_column();
    let sql = format!(
        "UPDATE {table} SET {counter} = {counter} - 1, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
        table = kind.table(),
    );

    for id in ids {
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} {}", kind, id)));
        }
    }

    Ok(())
}

/// Insert one join record per attribute id
pub async fn insert_links(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    entry_kind: EntryKind,
    entry_id: Uuid,
    attribute_ids: &[Uuid],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {table} ({attr_col}, {entry_col}) VALUES (?, ?)",
        table = join_table(entry_kind, kind)?,
        attr_col = kind.id_column(),
        entry_col = entry_kind.id_column(),
    );

    for attribute_id in attribute_ids {
        sqlx::query(&sql)
            .bind(attribute_id.to_string())
            .bind(entry_id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Delete the join records between `entry_id` and each attribute id
///
/// Returns the number of join records removed.
pub async fn delete_links(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    entry_kind: EntryKind,
    entry_id: Uuid,
    attribute_ids: &[Uuid],
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {table} WHERE {attr_col} = ? AND {entry_col} = ?",
        table = join_table(entry_kind, kind)?,
        attr_col = kind.id_column(),
        entry_col = entry_kind.id_column(),
    );

    let mut removed = 0;
    for attribute_id in attribute_ids {
        removed += sqlx::query(&sql)
            .bind(attribute_id.to_string())
            .bind(entry_id.to_string())
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    Ok(removed)
}

/// Resolve a reference list to attribute rows, preserving list order
///
/// Ids with no matching row are skipped.
pub async fn load_by_ids(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    ids: &[Uuid],
) -> Result<Vec<Attribute>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let ids_json = serde_json::to_string(ids)
        .map_err(|e| Error::Internal(format!("Failed to encode reference list: {}", e)))?;

    let sql = format!(
        r#"
        SELECT a.guid, a.name, a.songs, a.posts
        FROM json_each(?) AS refs
        JOIN {table} a ON a.guid = refs.value
        ORDER BY refs.key
        "#,
        table = kind.table(),
    );

    let rows = sqlx::query(&sql)
        .bind(ids_json)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(|row| attribute_from_row(kind, row)).collect()
}

/// Case-insensitive lookup by name
pub async fn find_by_name(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    name: &str,
) -> Result<Option<Attribute>> {
    let sql = format!(
        "SELECT guid, name, songs, posts FROM {table} WHERE name_key = ?",
        table = kind.table(),
    );

    let row = sqlx::query(&sql)
        .bind(normalize_name(name))
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| attribute_from_row(kind, &row)).transpose()
}

/// Attribute ids linked to `entry_id` through join records, sorted
pub async fn linked_ids(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    entry_kind: EntryKind,
    entry_id: Uuid,
) -> Result<Vec<Uuid>> {
    let sql = format!(
        "SELECT {attr_col} FROM {table} WHERE {entry_col} = ? ORDER BY {attr_col}",
        table = join_table(entry_kind, kind)?,
        attr_col = kind.id_column(),
        entry_col = entry_kind.id_column(),
    );

    let ids: Vec<String> = sqlx::query_scalar(&sql)
        .bind(entry_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    ids.iter()
        .map(|id| Uuid::parse_str(id).map_err(|e| Error::Internal(format!("Bad {} id {}: {}", kind, id, e))))
        .collect()
}
