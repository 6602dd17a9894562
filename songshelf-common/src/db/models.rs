//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Normalized, reusable classification attached to entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Tag,
    Artist,
    Usage,
}

impl AttributeKind {
    /// Reference collection table
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Artist => "artists",
            AttributeKind::Usage => "usages",
        }
    }

    /// Column on the entry table holding the JSON reference list
    pub fn reference_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Artist => "artists",
            AttributeKind::Usage => "usage",
        }
    }

    /// Attribute column in join tables
    pub fn id_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Artist => "artist_id",
            AttributeKind::Usage => "usage_id",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttributeKind::Tag => "tag",
            AttributeKind::Artist => "artist",
            AttributeKind::Usage => "usage",
        };
        f.write_str(label)
    }
}

/// Top-level user-created record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Song,
    Post,
}

impl EntryKind {
    pub fn table(self) -> &'static str {
        match self {
            EntryKind::Song => "songs",
            EntryKind::Post => "posts",
        }
    }

    /// Column holding the free-text body (song notes, post content)
    pub fn body_column(self) -> &'static str {
        match self {
            EntryKind::Song => "notes",
            EntryKind::Post => "content",
        }
    }

    /// Per-attribute counter column tracking references from this entry kind
    pub fn counter_column(self) -> &'static str {
        match self {
            EntryKind::Song => "songs",
            EntryKind::Post => "posts",
        }
    }

    /// Entry column in join tables
    pub fn id_column(self) -> &'static str {
        match self {
            EntryKind::Song => "song_id",
            EntryKind::Post => "post_id",
        }
    }

    /// Attribute kinds carried by this entry kind, in reconciliation order
    pub fn attribute_kinds(self) -> &'static [AttributeKind] {
        match self {
            EntryKind::Song => &[AttributeKind::Tag, AttributeKind::Artist, AttributeKind::Usage],
            EntryKind::Post => &[AttributeKind::Tag],
        }
    }

    /// Join table linking `attribute` to this entry kind, if the pair exists
    pub fn join_table(self, attribute: AttributeKind) -> Option<&'static str> {
        match (attribute, self) {
            (AttributeKind::Tag, EntryKind::Song) => Some("tag_songs"),
            (AttributeKind::Artist, EntryKind::Song) => Some("artist_songs"),
            (AttributeKind::Usage, EntryKind::Song) => Some("usage_songs"),
            (AttributeKind::Tag, EntryKind::Post) => Some("tag_posts"),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Song => f.write_str("song"),
            EntryKind::Post => f.write_str("post"),
        }
    }
}

/// Identity key for attribute names: trimmed and Unicode-lowercased
///
/// Two names with the same key are the same attribute.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Song or post row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub title: String,
    /// Song notes or post content
    pub body: String,
    pub author_id: Uuid,
    pub views: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comments: i64,
    /// Attribute ids per kind, in attach order
    pub references: BTreeMap<AttributeKind, Vec<Uuid>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn references_of(&self, kind: AttributeKind) -> &[Uuid] {
        self.references.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Tag, artist or usage category row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Uuid,
    pub kind: AttributeKind,
    /// Casing of the first insertion
    pub name: String,
    /// Number of songs referencing this attribute
    pub songs: i64,
    /// Number of posts referencing this attribute
    pub posts: i64,
}

impl Attribute {
    pub fn count_for(&self, kind: EntryKind) -> i64 {
        match kind {
            EntryKind::Song => self.songs,
            EntryKind::Post => self.posts,
        }
    }
}

/// Public author fields attached to listed entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub image: Option<String>,
}

/// Entry with its attribute references resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryWithAttributes {
    #[serde(flatten)]
    pub entry: Entry,
    pub attributes: BTreeMap<AttributeKind, Vec<Attribute>>,
    pub author: Option<Author>,
}

impl EntryWithAttributes {
    pub fn attributes_of(&self, kind: AttributeKind) -> &[Attribute] {
        self.attributes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Display names of the attached attributes of `kind`
    pub fn names_of(&self, kind: AttributeKind) -> Vec<&str> {
        self.attributes_of(kind).iter().map(|a| a.name.as_str()).collect()
    }
}
