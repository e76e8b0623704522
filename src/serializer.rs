//! Songbook → document description. The description is what the typesetting
//! engine reads: titles, the author line and one content entry per item, in
//! rank order.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::ser::{Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::db::{fetch_slots, fetch_songbook};
use crate::error::SongbookError;
use crate::models::{ItemSlot, SongBook};
use crate::registry::{resolve_ids, ItemKind};

/// Marker the engine uses to recognize a section heading entry.
pub const SECTION_TAG: &str = "songsection";
/// Words the engine treats as separators between author names.
pub const AUTHOR_SEPARATORS: [&str; 2] = ["and", "et"];
/// Replacement for a line break in the subtitle: end the markup line, force an
/// explicit break, and swallow the following line end.
pub const MARKUP_LINE_BREAK: &str = "%\r\n\\newline%\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEntry {
    /// Serialized as the bare song path.
    Song(String),
    /// Serialized as `["songsection", name]`.
    Section(String),
}

impl Serialize for ContentEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentEntry::Song(path) => serializer.serialize_str(path),
            ContentEntry::Section(name) => (SECTION_TAG, name).serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AuthWords {
    pub sep: Vec<String>,
}

impl Default for AuthWords {
    fn default() -> Self {
        Self {
            sep: AUTHOR_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SongbookDescription {
    pub subtitle: String,
    pub title: String,
    pub author: String,
    pub content: Vec<ContentEntry>,
    pub authwords: AuthWords,
}

/// Replace every line break (`\r\n`, `\r` or `\n`) with an explicit markup
/// line break so multi-line descriptions keep their shape.
pub fn escape_newlines(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                escaped.push_str(MARKUP_LINE_BREAK);
            }
            '\n' => escaped.push_str(MARKUP_LINE_BREAK),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Build the description from already loaded data. `slots` must be in rank
/// order; `resolved` holds the looked-up value of every id per kind.
pub fn describe(
    songbook: &SongBook,
    slots: &[ItemSlot],
    resolved: &HashMap<ItemKind, HashMap<i64, String>>,
) -> Result<SongbookDescription, SongbookError> {
    let content = slots
        .iter()
        .map(|slot| {
            resolved
                .get(&slot.item.kind)
                .and_then(|values| values.get(&slot.item.id))
                .map(|value| slot.item.kind.render(value.clone()))
                .ok_or(SongbookError::DanglingItem {
                    songbook_id: songbook.id,
                    kind: slot.item.kind,
                    item_id: slot.item.id,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SongbookDescription {
        subtitle: escape_newlines(&songbook.description),
        title: songbook.title.clone(),
        author: songbook.owner.clone(),
        content,
        authwords: AuthWords::default(),
    })
}

/// Load a songbook and its items and describe it. Items are resolved with one
/// lookup per kind, however many items the songbook holds.
pub fn describe_songbook(conn: &Connection, songbook_id: i64) -> Result<SongbookDescription> {
    let songbook = fetch_songbook(conn, songbook_id)?;
    let slots = fetch_slots(conn, songbook_id)?;

    let mut ids_by_kind: HashMap<ItemKind, Vec<i64>> = HashMap::new();
    for slot in &slots {
        ids_by_kind
            .entry(slot.item.kind)
            .or_default()
            .push(slot.item.id);
    }

    let mut resolved = HashMap::new();
    for (kind, ids) in ids_by_kind {
        resolved.insert(kind, resolve_ids(conn, kind, &ids)?);
    }

    let description = describe(&songbook, &slots, &resolved)
        .with_context(|| format!("failed to describe songbook \"{}\"", songbook.title))?;
    Ok(description)
}

/// SHA-1 of the serialized description; changes whenever anything the engine
/// would see changes.
pub fn songbook_hash(description: &SongbookDescription) -> Result<String> {
    let bytes = serde_json::to_vec(description).context("failed to serialize songbook")?;
    Ok(format!("{:x}", Sha1::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemRef;

    fn book(description: &str) -> SongBook {
        SongBook {
            id: 3,
            title: "Campfire".into(),
            slug: "campfire".into(),
            description: description.into(),
            is_public: true,
            owner: "alice".into(),
        }
    }

    fn slot(item: ItemRef, rank: i64) -> ItemSlot {
        ItemSlot {
            id: rank,
            songbook_id: 3,
            item,
            rank,
        }
    }

    #[test]
    fn newlines_become_markup_breaks() {
        assert_eq!(
            escape_newlines("line1\nline2"),
            "line1%\r\n\\newline%\r\nline2"
        );
        assert_eq!(
            escape_newlines("a\r\nb\rc"),
            format!("a{MARKUP_LINE_BREAK}b{MARKUP_LINE_BREAK}c")
        );
        assert_eq!(escape_newlines("single"), "single");
    }

    #[test]
    fn content_follows_slot_order() {
        let slots = vec![
            slot(ItemRef::section(1), 1),
            slot(ItemRef::song(10), 2),
            slot(ItemRef::song(11), 3),
        ];
        let mut resolved = HashMap::new();
        resolved.insert(
            ItemKind::Song,
            HashMap::from([(10, "songs/a.sgc".to_string()), (11, "songs/b.sgc".to_string())]),
        );
        resolved.insert(ItemKind::Section, HashMap::from([(1, "Intro".to_string())]));

        let description = describe(&book("first\nsecond"), &slots, &resolved).unwrap();
        assert_eq!(
            description.content,
            vec![
                ContentEntry::Section("Intro".into()),
                ContentEntry::Song("songs/a.sgc".into()),
                ContentEntry::Song("songs/b.sgc".into()),
            ]
        );
        assert!(description.subtitle.contains("\\newline"));
        assert!(!description.subtitle.contains("first\nsecond"));

        let json = serde_json::to_value(&description).unwrap();
        assert_eq!(json["content"][0], serde_json::json!(["songsection", "Intro"]));
        assert_eq!(json["content"][1], "songs/a.sgc");
        assert_eq!(json["authwords"]["sep"], serde_json::json!(["and", "et"]));
        assert_eq!(json["author"], "alice");
    }

    #[test]
    fn missing_items_fail_instead_of_vanishing() {
        let slots = vec![slot(ItemRef::song(10), 1)];
        let err = describe(&book(""), &slots, &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            SongbookError::DanglingItem {
                songbook_id: 3,
                kind: ItemKind::Song,
                item_id: 10,
            }
        );
    }

    #[test]
    fn hash_tracks_content() {
        let empty = describe(&book(""), &[], &HashMap::new()).unwrap();
        let other = describe(&book("changed"), &[], &HashMap::new()).unwrap();
        let hash = songbook_hash(&empty).unwrap();
        assert_eq!(hash.len(), 40);
        assert_eq!(hash, songbook_hash(&empty).unwrap());
        assert_ne!(hash, songbook_hash(&other).unwrap());
    }
}
