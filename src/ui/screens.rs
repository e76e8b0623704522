use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rusqlite::Connection;

use crate::db::{
    count_distinct_artists, count_items, count_sections, count_songs, fetch_all_songs,
    fetch_artists, fetch_available_songs, fetch_layouts, fetch_slots, fetch_songbook,
    fetch_songbooks,
};
use crate::layout::Layout;
use crate::models::{ItemSlot, Song, SongBook};
use crate::registry::{resolve_ids, ItemKind};

use super::helpers::step_selection;

/// One row of the songbook list, with its counters preloaded.
pub(crate) struct SongbookSummary {
    pub(crate) book: SongBook,
    pub(crate) items: i64,
    pub(crate) songs: i64,
    pub(crate) sections: i64,
    pub(crate) artists: i64,
}

impl SongbookSummary {
    pub(crate) fn load_all(conn: &Connection) -> Result<Vec<Self>> {
        fetch_songbooks(conn)?
            .into_iter()
            .map(|book| -> Result<Self> {
                Ok(Self {
                    items: count_items(conn, book.id)?,
                    songs: count_songs(conn, book.id)?,
                    sections: count_sections(conn, book.id)?,
                    artists: count_distinct_artists(conn, book.id)?,
                    book,
                })
            })
            .collect()
    }

    pub(crate) fn counts_line(&self) -> String {
        format!(
            "{} items • {} songs • {} sections • {} artists",
            self.items, self.songs, self.sections, self.artists
        )
    }
}

/// A slot plus the text shown for it.
pub(crate) struct ItemEntry {
    pub(crate) slot: ItemSlot,
    pub(crate) label: String,
}

/// Contents of one songbook, in rank order.
pub(crate) struct ItemsScreen {
    pub(crate) songbook: SongBook,
    pub(crate) entries: Vec<ItemEntry>,
    pub(crate) selected: usize,
}

impl ItemsScreen {
    pub(crate) fn load(conn: &Connection, songbook_id: i64) -> Result<Self> {
        let mut screen = Self {
            songbook: fetch_songbook(conn, songbook_id)?,
            entries: Vec::new(),
            selected: 0,
        };
        screen.reload(conn)?;
        Ok(screen)
    }

    /// Re-read the slots, keeping the cursor on the same slot when it still
    /// exists.
    pub(crate) fn reload(&mut self, conn: &Connection) -> Result<()> {
        let focus = self.current().map(|entry| entry.slot.id);
        let slots = fetch_slots(conn, self.songbook.id)?;

        let titles: HashMap<i64, String> = fetch_all_songs(conn)?
            .into_iter()
            .map(|song| (song.id, song.title))
            .collect();
        let section_ids: Vec<i64> = slots
            .iter()
            .filter(|slot| slot.item.kind == ItemKind::Section)
            .map(|slot| slot.item.id)
            .collect();
        let section_names = resolve_ids(conn, ItemKind::Section, &section_ids)?;

        self.entries = slots
            .into_iter()
            .map(|slot| {
                let name = match slot.item.kind {
                    ItemKind::Song => titles.get(&slot.item.id),
                    ItemKind::Section => section_names.get(&slot.item.id),
                };
                let label = match (slot.item.kind, name) {
                    (ItemKind::Song, Some(title)) => format!("♪ {title}"),
                    (ItemKind::Section, Some(name)) => format!("§ {}", name.to_uppercase()),
                    (kind, None) => format!("<missing {} #{}>", kind.tag(), slot.item.id),
                };
                ItemEntry { slot, label }
            })
            .collect();

        if let Some(focus) = focus {
            if let Some(index) = self.entries.iter().position(|e| e.slot.id == focus) {
                self.selected = index;
            }
        }
        self.selected = step_selection(self.selected, self.entries.len(), 0);
        Ok(())
    }

    pub(crate) fn current(&self) -> Option<&ItemEntry> {
        self.entries.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.entries.len(), offset);
    }

    /// Whether ranks are exactly `1..=N`.
    pub(crate) fn is_dense(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(index, entry)| entry.slot.rank == index as i64 + 1)
    }
}

/// Every song in the library.
pub(crate) struct SongLibraryScreen {
    pub(crate) songs: Vec<Song>,
    pub(crate) artists: HashMap<i64, String>,
    pub(crate) selected: usize,
}

impl SongLibraryScreen {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        let mut screen = Self {
            songs: Vec::new(),
            artists: HashMap::new(),
            selected: 0,
        };
        screen.reload(conn)?;
        Ok(screen)
    }

    pub(crate) fn reload(&mut self, conn: &Connection) -> Result<()> {
        self.songs = fetch_all_songs(conn)?;
        self.artists = fetch_artists(conn)?
            .into_iter()
            .map(|artist| (artist.id, artist.name))
            .collect();
        self.selected = step_selection(self.selected, self.songs.len(), 0);
        Ok(())
    }

    pub(crate) fn current(&self) -> Option<&Song> {
        self.songs.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.songs.len(), offset);
    }

    pub(crate) fn describe(&self, song: &Song) -> String {
        let artist = song
            .artist_id
            .and_then(|id| self.artists.get(&id))
            .map(String::as_str)
            .unwrap_or("unknown artist");
        let language = song.language.as_deref().unwrap_or("--");
        format!("{} - {} [{}]", song.title, artist, language)
    }
}

/// Layouts belonging to the configured owner.
pub(crate) struct LayoutsScreen {
    pub(crate) layouts: Vec<Layout>,
    pub(crate) selected: usize,
}

impl LayoutsScreen {
    pub(crate) fn load(conn: &Connection, owner: &str) -> Result<Self> {
        let layouts = fetch_layouts(conn, Some(owner))?;
        Ok(Self {
            layouts,
            selected: 0,
        })
    }

    pub(crate) fn current(&self) -> Option<&Layout> {
        self.layouts.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.layouts.len(), offset);
    }
}

/// Label for a layout in lists. A layout without orientation is still shown,
/// flagged, so it can be found and deleted.
pub(crate) fn layout_label(layout: &Layout) -> String {
    match layout.name() {
        Ok(name) => format!("{name} • {}", layout.booktype_name()),
        Err(_) => format!("{} (no orientation) • {}", layout.papersize, layout.booktype_name()),
    }
}

/// Multi-select picker for adding songs to a songbook.
pub(crate) struct AddSongState {
    pub(crate) songbook_id: i64,
    pub(crate) songs: Vec<Song>,
    pub(crate) checked: HashSet<i64>,
    pub(crate) selected: usize,
}

impl AddSongState {
    pub(crate) fn load(conn: &Connection, songbook_id: i64) -> Result<Self> {
        Ok(Self {
            songbook_id,
            songs: fetch_available_songs(conn, songbook_id)?,
            checked: HashSet::new(),
            selected: 0,
        })
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.songs.len(), offset);
    }

    pub(crate) fn toggle_current(&mut self) {
        if let Some(song) = self.songs.get(self.selected) {
            if !self.checked.remove(&song.id) {
                self.checked.insert(song.id);
            }
        }
    }

    /// Songs to add, in list order: the checked ones, or the one under the
    /// cursor when nothing is checked.
    pub(crate) fn chosen(&self) -> Vec<i64> {
        if self.checked.is_empty() {
            self.songs
                .get(self.selected)
                .map(|song| vec![song.id])
                .unwrap_or_default()
        } else {
            self.songs
                .iter()
                .filter(|song| self.checked.contains(&song.id))
                .map(|song| song.id)
                .collect()
        }
    }
}

/// Layout chooser shown before exporting a songbook.
pub(crate) struct LayoutPicker {
    pub(crate) songbook_id: i64,
    pub(crate) layouts: Vec<Layout>,
    pub(crate) selected: usize,
}

impl LayoutPicker {
    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.layouts.len(), offset);
    }

    pub(crate) fn current(&self) -> Option<&Layout> {
        self.layouts.get(self.selected)
    }
}
