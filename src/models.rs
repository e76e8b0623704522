//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI. They stay light-weight data holders; validation that must happen
//! before anything is stored lives in the constructors here.

use std::fmt;

use crate::error::SongbookError;
use crate::registry::ItemKind;
use crate::validators::validate_markup_free;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl fmt::Display for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Two-letter language code, lower case.
    pub language: Option<String>,
    pub artist_id: Option<i64>,
    /// Location of the source text, relative to the song library root.
    pub file_path: String,
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Editable song fields, checked before a song is created or updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongDraft {
    pub title: String,
    pub language: Option<String>,
    pub artist_id: Option<i64>,
}

impl SongDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_artist(mut self, artist_id: i64) -> Self {
        self.artist_id = Some(artist_id);
        self
    }

    /// Trim the title, lower-case the language and reject anything that
    /// would not round-trip through the store.
    pub fn normalized(&self) -> Result<SongDraft, SongbookError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(SongbookError::Validation {
                field: "title",
                message: "Song title is required.".to_string(),
            });
        }

        let language = match self.language.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                Some(code.to_ascii_lowercase())
            }
            Some(_) => {
                return Err(SongbookError::Validation {
                    field: "language",
                    message: "Language must be a two-letter code.".to_string(),
                })
            }
        };

        Ok(SongDraft {
            title: title.to_string(),
            language,
            artist_id: self.artist_id,
        })
    }
}

/// A section heading that is known to be safe for the typesetting markup.
/// The only way to obtain one is through [`SectionName::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionName(String);

impl SectionName {
    pub fn parse(name: &str) -> Result<Self, SongbookError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SongbookError::Validation {
                field: "section name",
                message: "Section name is required.".to_string(),
            });
        }
        validate_markup_free("section name", name)?;
        Ok(SectionName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: i64,
    pub name: SectionName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongBook {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub is_public: bool,
    /// Display text of the owning user.
    pub owner: String,
}

impl fmt::Display for SongBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.owner)
    }
}

/// Points at one concrete item of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemRef {
    pub fn song(id: i64) -> Self {
        Self {
            kind: ItemKind::Song,
            id,
        }
    }

    pub fn section(id: i64) -> Self {
        Self {
            kind: ItemKind::Section,
            id,
        }
    }
}

/// One entry of a songbook: which item sits at which rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSlot {
    pub id: i64,
    pub songbook_id: i64,
    pub item: ItemRef,
    pub rank: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_names_are_checked_on_creation() {
        assert_eq!(SectionName::parse("  Noël ").unwrap().as_str(), "Noël");
        assert!(SectionName::parse("Part [1]").is_err());
        assert!(SectionName::parse("   ").is_err());
    }

    #[test]
    fn song_draft_normalizes_language() {
        let draft = SongDraft::new(" Hallelujah ").with_language("EN");
        let normalized = draft.normalized().unwrap();
        assert_eq!(normalized.title, "Hallelujah");
        assert_eq!(normalized.language.as_deref(), Some("en"));

        assert!(SongDraft::new("x").with_language("eng").normalized().is_err());
        assert!(SongDraft::new("  ").normalized().is_err());
        assert_eq!(
            SongDraft::new("x").with_language(" ").normalized().unwrap().language,
            None
        );
    }

    #[test]
    fn songbook_display_includes_owner() {
        let book = SongBook {
            id: 1,
            title: "Campfire".into(),
            slug: "campfire".into(),
            description: String::new(),
            is_public: false,
            owner: "alice".into(),
        };
        assert_eq!(book.to_string(), "Campfire - alice");
    }
}
