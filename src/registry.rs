//! The closed set of things a songbook can hold. Every place that needs to
//! know "what is item #12 of kind X" goes through [`ItemKind`], so adding a
//! new kind means extending this enum and the kind-filtered counters in
//! `db::items`, nothing else.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};

use crate::error::SongbookError;
use crate::serializer::ContentEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Song,
    Section,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Song, ItemKind::Section];

    /// Value stored in `songbook_items.item_type`.
    pub fn tag(self) -> &'static str {
        match self {
            ItemKind::Song => "song",
            ItemKind::Section => "section",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, SongbookError> {
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| SongbookError::UnknownItemKind(tag.to_string()))
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemKind::Song => "Song",
            ItemKind::Section => "Section",
        }
    }

    /// Table holding the items of this kind and the column the serializer
    /// needs from it.
    fn lookup_source(self) -> (&'static str, &'static str) {
        match self {
            ItemKind::Song => ("songs", "file_path"),
            ItemKind::Section => ("sections", "name"),
        }
    }

    /// Turn the resolved value (song path or section name) into the entry the
    /// typesetting engine expects.
    pub fn render(self, value: String) -> ContentEntry {
        match self {
            ItemKind::Song => ContentEntry::Song(value),
            ItemKind::Section => ContentEntry::Section(value),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Resolve many ids of one kind in a single query. Ids without a matching row
/// are simply absent from the map; the caller decides whether that is fatal.
pub fn resolve_ids(conn: &Connection, kind: ItemKind, ids: &[i64]) -> Result<HashMap<i64, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let (table, column) = kind.lookup_source();
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT id, {column} FROM {table} WHERE id IN ({placeholders})");

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("failed to prepare {} lookup", kind.tag()))?;

    let resolved = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })
        .with_context(|| format!("failed to look up {} ids", kind.tag()))?
        .collect::<Result<HashMap<_, _>, _>>()
        .with_context(|| format!("failed to collect {} lookups", kind.tag()))?;

    Ok(resolved)
}
