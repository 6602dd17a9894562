//! Attribute reconciliation
//!
//! Keeps entries (songs, posts), their attribute reference collections (tags,
//! artists, usage categories) and the join records between them consistent.
//! Every write path runs inside one transaction: a failure at any step rolls
//! back the entry insert, attribute upserts, counter changes and join records
//! made by that call.
//!
//! Invariants after every successful call:
//! - each attribute name exists once per kind, compared by [`normalize_name`]
//! - an attribute's per-entry-kind counter equals its live join records
//! - an entry's join records equal its reference lists

use crate::db::attributes;
use crate::db::entries::{self, EntryFilter, SortOrder};
use crate::db::init::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::db::models::{Attribute, AttributeKind, Entry, EntryKind, EntryWithAttributes};
use crate::{Error, FieldError, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use crate::db::models::normalize_name;

/// Fields for a new entry
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub title: String,
    /// Song notes or post content
    pub body: String,
    pub owner_id: Uuid,
}

/// Replacement title and body for an edit
#[derive(Debug, Clone)]
pub struct EntryFields {
    pub title: String,
    pub body: String,
}

/// Desired attribute names per kind, in order
///
/// Kinds the target entry kind does not carry are ignored.
#[derive(Debug, Clone, Default)]
pub struct AttributeLists(BTreeMap<AttributeKind, Vec<String>>);

impl AttributeLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: AttributeKind, names: Vec<String>) -> Self {
        self.0.insert(kind, names);
        self
    }

    pub fn get(&self, kind: AttributeKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Listing filter key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Newest,
    Popular,
    /// Entries without comments, newest first
    Unanswered,
    /// Not implemented yet; always an empty page
    Recommended,
    /// Songs carrying the named usage category, newest first
    Usage(String),
}

/// Usage categories accepted on songs
pub const USAGE_CATEGORIES: [&str; 4] = [
    "commercial",
    "non-commercial",
    "commercial-official",
    "non-commercial-official",
];

impl Filter {
    /// Map a filter key to a filter; unknown or missing keys mean newest first
    pub fn parse(key: Option<&str>) -> Self {
        let Some(key) = key.map(|k| k.trim().to_lowercase()) else {
            return Filter::Newest;
        };

        match key.as_str() {
            "popular" => Filter::Popular,
            "unanswered" => Filter::Unanswered,
            "recommended" => Filter::Recommended,
            k if USAGE_CATEGORIES.contains(&k) => Filter::Usage(k.to_string()),
            _ => Filter::Newest,
        }
    }
}

/// Listing request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub query: Option<String>,
    pub filter: Option<String>,
    /// 1-indexed; values below 1 are treated as 1
    pub page: i64,
    /// Defaults to the `default_page_size` setting; capped at `max_page_size`
    pub page_size: Option<i64>,
}

/// One page of entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPage {
    pub entries: Vec<EntryWithAttributes>,
    pub is_next: bool,
}

/// Create an entry and attach its attributes atomically
///
/// Attributes are upserted by normalized name with their counter incremented,
/// one join record is inserted per (attribute, entry) pair and the entry's
/// reference lists are written last.
pub async fn create_with_attributes(
    pool: &SqlitePool,
    kind: EntryKind,
    draft: &EntryDraft,
    lists: &AttributeLists,
) -> Result<EntryWithAttributes> {
    let mut tx = pool.begin().await?;

    let entry = match create_in_tx(&mut tx, kind, draft, lists).await {
        Ok(entry) => entry,
        Err(e) => {
            abort(tx, kind, &e).await;
            return Err(e);
        }
    };

    tx.commit().await?;

    info!(
        "Created {} {} ({}) with {} attribute(s)",
        kind,
        entry.id,
        entry.title,
        entry.references.values().map(Vec::len).sum::<usize>()
    );

    fetch_with_attributes(pool, kind, entry.id).await
}

async fn create_in_tx(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    draft: &EntryDraft,
    lists: &AttributeLists,
) -> Result<Entry> {
    let mut entry = entries::insert_entry(conn, kind, &draft.title, &draft.body, draft.owner_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Failed to create {}", kind)))?;

    for attribute_kind in kind.attribute_kinds() {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();

        for name in lists.get(*attribute_kind) {
            let key = normalize_name(name);
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            let attribute = attributes::upsert_and_increment(conn, *attribute_kind, kind, name).await?;
            debug!("Attached {} '{}' to {} {}", attribute_kind, attribute.name, kind, entry.id);
            ids.push(attribute.id);
        }

        attributes::insert_links(conn, *attribute_kind, kind, entry.id, &ids).await?;
        entry.references.insert(*attribute_kind, ids);
    }

    entries::update_references(conn, &entry).await?;

    Ok(entry)
}

/// Edit an entry owned by `acting_user`, reconciling its attributes atomically
///
/// For each attribute kind, names are diffed against the currently attached
/// attributes by normalized name. Added names are upserted and linked;
/// dropped attributes are decremented and unlinked. Names that match an
/// attached attribute in a different case change nothing.
pub async fn edit_with_attributes(
    pool: &SqlitePool,
    kind: EntryKind,
    entry_id: Uuid,
    fields: &EntryFields,
    lists: &AttributeLists,
    acting_user: Uuid,
) -> Result<EntryWithAttributes> {
    let mut tx = pool.begin().await?;

    if let Err(e) = edit_in_tx(&mut tx, kind, entry_id, fields, lists, acting_user).await {
        abort(tx, kind, &e).await;
        return Err(e);
    }

    tx.commit().await?;

    info!("Edited {} {}", kind, entry_id);

    fetch_with_attributes(pool, kind, entry_id).await
}

async fn edit_in_tx(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    entry_id: Uuid,
    fields: &EntryFields,
    lists: &AttributeLists,
    acting_user: Uuid,
) -> Result<()> {
    let mut entry = entries::load_entry(conn, kind, entry_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", kind, entry_id)))?;

    if entry.author_id != acting_user {
        return Err(Error::Unauthorized(format!(
            "user {} does not own {} {}",
            acting_user, kind, entry_id
        )));
    }

    if entry.title != fields.title || entry.body != fields.body {
        entry.title = fields.title.clone();
        entry.body = fields.body.clone();
        entries::update_fields(conn, &entry).await?;
    }

    for attribute_kind in kind.attribute_kinds() {
        let current = attributes::load_by_ids(conn, *attribute_kind, entry.references_of(*attribute_kind)).await?;
        let diff = AttributeDiff::compute(&current, lists.get(*attribute_kind));

        let mut references = entry.references_of(*attribute_kind).to_vec();

        let mut added = Vec::with_capacity(diff.to_add.len());
        for name in &diff.to_add {
            let attribute = attributes::upsert_and_increment(conn, *attribute_kind, kind, name).await?;
            debug!("Attached {} '{}' to {} {}", attribute_kind, attribute.name, kind, entry_id);
            references.push(attribute.id);
            added.push(attribute.id);
        }

        if !diff.to_remove.is_empty() {
            attributes::decrement(conn, *attribute_kind, kind, &diff.to_remove).await?;
            let unlinked = attributes::delete_links(conn, *attribute_kind, kind, entry_id, &diff.to_remove).await?;
            debug!("Detached {} {}(s) from {} {}", unlinked, attribute_kind, kind, entry_id);
            references.retain(|id| !diff.to_remove.contains(id));
        }

        attributes::insert_links(conn, *attribute_kind, kind, entry_id, &added).await?;
        entry.references.insert(*attribute_kind, references);
    }

    entries::update_references(conn, &entry).await?;

    Ok(())
}

/// Names to attach and attribute ids to detach for one attribute kind
#[derive(Debug, Default, PartialEq, Eq)]
struct AttributeDiff {
    to_add: Vec<String>,
    to_remove: Vec<Uuid>,
}

impl AttributeDiff {
    fn compute(current: &[Attribute], desired: &[String]) -> Self {
        let current_keys: HashSet<String> = current.iter().map(|a| normalize_name(&a.name)).collect();

        let mut desired_keys = HashSet::new();
        let mut to_add = Vec::new();
        for name in desired {
            let key = normalize_name(name);
            if key.is_empty() || !desired_keys.insert(key.clone()) {
                continue;
            }
            if !current_keys.contains(&key) {
                to_add.push(name.trim().to_string());
            }
        }

        let to_remove = current
            .iter()
            .filter(|a| !desired_keys.contains(&normalize_name(&a.name)))
            .map(|a| a.id)
            .collect();

        Self { to_add, to_remove }
    }
}

async fn abort(tx: Transaction<'_, Sqlite>, kind: EntryKind, cause: &Error) {
    warn!("Aborting {} transaction: {}", kind, cause);
    if let Err(e) = tx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

/// Load an entry with its attributes and author resolved
pub async fn fetch_with_attributes(pool: &SqlitePool, kind: EntryKind, entry_id: Uuid) -> Result<EntryWithAttributes> {
    let mut conn = pool.acquire().await?;

    let entry = entries::load_entry(&mut conn, kind, entry_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", kind, entry_id)))?;

    populate(&mut conn, entry).await
}

async fn populate(conn: &mut SqliteConnection, entry: Entry) -> Result<EntryWithAttributes> {
    let mut resolved = BTreeMap::new();
    for attribute_kind in entry.kind.attribute_kinds() {
        let list = attributes::load_by_ids(conn, *attribute_kind, entry.references_of(*attribute_kind)).await?;
        resolved.insert(*attribute_kind, list);
    }

    let author = entries::load_author(conn, entry.author_id).await?;

    Ok(EntryWithAttributes {
        entry,
        attributes: resolved,
        author,
    })
}

/// List one page of entries, optionally searched and filtered
///
/// `is_next` is true when more matching entries exist past this page.
pub async fn list_paginated(pool: &SqlitePool, kind: EntryKind, query: &ListQuery) -> Result<EntryPage> {
    let filter = Filter::parse(query.filter.as_deref());
    if filter == Filter::Recommended {
        return Ok(EntryPage {
            entries: Vec::new(),
            is_next: false,
        });
    }

    let mut conn = pool.acquire().await?;

    let default_page_size = entries::setting_i64(&mut conn, "default_page_size", DEFAULT_PAGE_SIZE).await?;
    let max_page_size = entries::setting_i64(&mut conn, "max_page_size", MAX_PAGE_SIZE).await?;
    let page = query.page.max(1);
    let page_size = query.page_size.unwrap_or(default_page_size).clamp(1, max_page_size.max(1));
    let skip = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| Error::validation(vec![FieldError::new("page", "is out of range")]))?;

    let mut row_filter = EntryFilter {
        search: query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        ..EntryFilter::default()
    };

    let order = match &filter {
        Filter::Popular => SortOrder::MostUpvoted,
        Filter::Unanswered => {
            row_filter.uncommented = true;
            SortOrder::Newest
        }
        Filter::Usage(name) if kind == EntryKind::Song => {
            // An unknown category leaves the listing unfiltered
            if let Some(usage) = attributes::find_by_name(&mut conn, AttributeKind::Usage, name).await? {
                debug!("Filtering songs by usage '{}'", usage.name);
                row_filter.usage_id = Some(usage.id);
            }
            SortOrder::Newest
        }
        _ => SortOrder::Newest,
    };

    let total = entries::count_entries(&mut conn, kind, &row_filter).await?;
    let rows = entries::list_entries(&mut conn, kind, &row_filter, order, page_size, skip).await?;
    let is_next = total > skip + rows.len() as i64;

    let mut page_entries = Vec::with_capacity(rows.len());
    for entry in rows {
        page_entries.push(populate(&mut conn, entry).await?);
    }

    Ok(EntryPage {
        entries: page_entries,
        is_next,
    })
}

/// Case-insensitive attribute lookup
pub async fn attribute_by_name(pool: &SqlitePool, kind: AttributeKind, name: &str) -> Result<Option<Attribute>> {
    let mut conn = pool.acquire().await?;
    attributes::find_by_name(&mut conn, kind, name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute(name: &str) -> Attribute {
        Attribute {
            id: Uuid::new_v4(),
            kind: AttributeKind::Tag,
            name: name.to_string(),
            songs: 1,
            posts: 0,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(Filter::parse(None), Filter::Newest);
        assert_eq!(Filter::parse(Some("newest")), Filter::Newest);
        assert_eq!(Filter::parse(Some("Popular")), Filter::Popular);
        assert_eq!(Filter::parse(Some("unanswered")), Filter::Unanswered);
        assert_eq!(Filter::parse(Some("recommended")), Filter::Recommended);
        assert_eq!(
            Filter::parse(Some("non-commercial-official")),
            Filter::Usage("non-commercial-official".to_string())
        );
        assert_eq!(Filter::parse(Some("bogus")), Filter::Newest);
    }

    #[test]
    fn test_diff_is_case_insensitive_exact_match() {
        let rock = attribute("Rock");
        let metal = attribute("Metal");
        let current = vec![rock.clone(), metal.clone()];

        let diff = AttributeDiff::compute(&current, &names(&["rock", "Jazz"]));

        assert_eq!(diff.to_add, vec!["Jazz".to_string()]);
        assert_eq!(diff.to_remove, vec![metal.id]);
    }

    #[test]
    fn test_diff_substring_is_not_a_match() {
        // "Rock" is a substring of "Rockabilly" but a different attribute
        let rockabilly = attribute("Rockabilly");
        let diff = AttributeDiff::compute(&[rockabilly.clone()], &names(&["Rock"]));

        assert_eq!(diff.to_add, vec!["Rock".to_string()]);
        assert_eq!(diff.to_remove, vec![rockabilly.id]);
    }

    #[test]
    fn test_diff_ignores_duplicates_and_blanks() {
        let diff = AttributeDiff::compute(&[], &names(&["Lofi", "LOFI", "  ", "lofi "]));
        assert_eq!(diff.to_add, vec!["Lofi".to_string()]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_diff_unchanged_list_is_empty() {
        let current = vec![attribute("Chill"), attribute("Ambient")];
        let diff = AttributeDiff::compute(&current, &names(&["ambient", "CHILL"]));
        assert_eq!(diff, AttributeDiff::default());
    }

    #[test]
    fn test_attribute_lists_missing_kind_is_empty() {
        let lists = AttributeLists::new().with(AttributeKind::Tag, names(&["a"]));
        assert_eq!(lists.get(AttributeKind::Tag), &["a".to_string()]);
        assert!(lists.get(AttributeKind::Artist).is_empty());
    }
}
