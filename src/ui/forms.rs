use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::geometry::Papersize;
use crate::layout::{BookType, Layout, Orientation};
use crate::models::{SectionName, SongBook, SongDraft};
use crate::validators::{is_markup_free, markup_free_attributes};

use super::helpers::field_line;

/// Internal representation of the songbook form fields.
#[derive(Default, Clone)]
pub(crate) struct SongbookForm {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) is_public: bool,
    pub(crate) active: SongbookField,
    pub(crate) error: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum SongbookField {
    #[default]
    Title,
    Description,
    Public,
}

impl SongbookForm {
    pub(crate) fn from_songbook(book: &SongBook) -> Self {
        Self {
            title: book.title.clone(),
            description: book.description.clone(),
            is_public: book.is_public,
            active: SongbookField::Title,
            error: None,
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            SongbookField::Title => SongbookField::Description,
            SongbookField::Description => SongbookField::Public,
            SongbookField::Public => SongbookField::Title,
        };
    }

    /// Append a character to the active field. Space flips the public flag
    /// when that field is focused.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            SongbookField::Title => self.title.push(ch),
            SongbookField::Description => self.description.push(ch),
            SongbookField::Public => {
                if ch == ' ' {
                    self.is_public = !self.is_public;
                } else {
                    return false;
                }
            }
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            SongbookField::Title => {
                self.title.pop();
            }
            SongbookField::Description => {
                self.description.pop();
            }
            SongbookField::Public => {}
        }
    }

    pub(crate) fn parse_inputs(&self) -> Result<(String, String, bool)> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(anyhow!("Songbook title is required."));
        }
        Ok((
            title.to_string(),
            self.description.trim_end().to_string(),
            self.is_public,
        ))
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        let public = if self.is_public { "yes" } else { "no" };
        vec![
            field_line(
                "Title",
                &self.title,
                "<required>",
                self.active == SongbookField::Title,
            ),
            field_line(
                "Description",
                &self.description.replace('\n', " ⏎ "),
                "<optional>",
                self.active == SongbookField::Description,
            ),
            field_line(
                "Public",
                public,
                "",
                self.active == SongbookField::Public,
            ),
        ]
    }
}

/// Form for a new section heading. The name is checked as it is typed so the
/// user sees the forbidden characters before submitting.
#[derive(Default, Clone)]
pub(crate) struct SectionForm {
    pub(crate) songbook_id: i64,
    pub(crate) name: String,
    pub(crate) error: Option<String>,
}

impl SectionForm {
    pub(crate) fn new(songbook_id: i64) -> Self {
        Self {
            songbook_id,
            ..Self::default()
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.name.push(ch);
        self.refresh_hint();
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.name.pop();
        self.refresh_hint();
    }

    fn refresh_hint(&mut self) {
        self.error = if is_markup_free(&self.name) {
            None
        } else {
            Some(markup_free_attributes().title)
        };
    }

    pub(crate) fn parse_inputs(&self) -> Result<SectionName> {
        Ok(SectionName::parse(&self.name)?)
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        let style = if self.error.is_some() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Yellow)
        };
        vec![Line::from(vec![
            Span::raw("Name: "),
            Span::styled(self.name.clone(), style),
        ])]
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum SongField {
    #[default]
    Title,
    Language,
    Artist,
}

/// Form state for song creation.
#[derive(Default, Clone)]
pub(crate) struct SongForm {
    pub(crate) title: String,
    pub(crate) language: String,
    pub(crate) artist: String,
    pub(crate) active: SongField,
    pub(crate) error: Option<String>,
}

impl SongForm {
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::Language,
            SongField::Language => SongField::Artist,
            SongField::Artist => SongField::Title,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            SongField::Title => self.title.push(ch),
            SongField::Language => {
                if !ch.is_ascii_alphabetic() || self.language.len() >= 2 {
                    return false;
                }
                self.language.push(ch);
            }
            SongField::Artist => self.artist.push(ch),
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            SongField::Title => {
                self.title.pop();
            }
            SongField::Language => {
                self.language.pop();
            }
            SongField::Artist => {
                self.artist.pop();
            }
        }
    }

    /// Validated draft plus the typed artist name, if any. The artist is
    /// resolved against the store by the caller.
    pub(crate) fn parse_inputs(&self) -> Result<(SongDraft, Option<String>)> {
        let mut draft = SongDraft::new(self.title.clone());
        if !self.language.trim().is_empty() {
            draft = draft.with_language(self.language.clone());
        }
        let draft = draft.normalized()?;
        let artist = Some(self.artist.trim().to_string()).filter(|name| !name.is_empty());
        Ok((draft, artist))
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        vec![
            field_line(
                "Title",
                &self.title,
                "<required>",
                self.active == SongField::Title,
            ),
            field_line(
                "Language",
                &self.language,
                "<two letters>",
                self.active == SongField::Language,
            ),
            field_line(
                "Artist",
                &self.artist,
                "<optional>",
                self.active == SongField::Artist,
            ),
        ]
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum LayoutField {
    #[default]
    Papersize,
    BookType,
    Orientation,
}

/// Layout form: every field is a choice cycled with the arrow keys.
#[derive(Clone)]
pub(crate) struct LayoutForm {
    pub(crate) papersizes: Vec<Papersize>,
    pub(crate) paper_index: usize,
    pub(crate) booktype: BookType,
    pub(crate) orientation: Orientation,
    pub(crate) active: LayoutField,
}

impl LayoutForm {
    pub(crate) fn new(papersizes: Vec<Papersize>) -> Self {
        Self {
            papersizes,
            paper_index: 0,
            booktype: BookType::default(),
            orientation: Orientation::Portrait,
            active: LayoutField::default(),
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            LayoutField::Papersize => LayoutField::BookType,
            LayoutField::BookType => LayoutField::Orientation,
            LayoutField::Orientation => LayoutField::Papersize,
        };
    }

    /// Step the active field's value forward or backward.
    pub(crate) fn cycle(&mut self, forward: bool) {
        match self.active {
            LayoutField::Papersize => {
                let len = self.papersizes.len();
                if len > 0 {
                    self.paper_index = if forward {
                        (self.paper_index + 1) % len
                    } else {
                        (self.paper_index + len - 1) % len
                    };
                }
            }
            LayoutField::BookType => {
                self.booktype = match self.booktype {
                    BookType::Chorded => BookType::Lyric,
                    BookType::Lyric => BookType::Chorded,
                };
            }
            LayoutField::Orientation => {
                self.orientation = match self.orientation {
                    Orientation::Portrait => Orientation::Landscape,
                    Orientation::Landscape => Orientation::Portrait,
                };
            }
        }
    }

    pub(crate) fn build(&self, owner: &str) -> Result<Layout> {
        let papersize = self
            .papersizes
            .get(self.paper_index)
            .cloned()
            .ok_or_else(|| anyhow!("No papersize available."))?;
        let mut layout = Layout::new(owner, papersize, self.orientation);
        layout.booktype = self.booktype;
        Ok(layout)
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        let paper = self
            .papersizes
            .get(self.paper_index)
            .map(|p| format!("{} ({}×{} mm)", p.name, p.width, p.height))
            .unwrap_or_default();
        vec![
            field_line(
                "Paper",
                &paper,
                "<none>",
                self.active == LayoutField::Papersize,
            ),
            field_line(
                "Book type",
                self.booktype.label(),
                "",
                self.active == LayoutField::BookType,
            ),
            field_line(
                "Orientation",
                &self.orientation.to_string(),
                "",
                self.active == LayoutField::Orientation,
            ),
        ]
    }
}

/// Confirmation for deleting a songbook, song or layout.
#[derive(Clone)]
pub(crate) struct ConfirmDelete {
    pub(crate) id: i64,
    pub(crate) label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_form_flags_forbidden_characters_while_typing() {
        let mut form = SectionForm::new(1);
        for ch in "Act {".chars() {
            form.push_char(ch);
        }
        assert!(form.error.is_some());
        assert!(form.parse_inputs().is_err());

        form.backspace();
        form.push_char('I');
        assert!(form.error.is_none());
        assert_eq!(form.parse_inputs().unwrap().as_str(), "Act I");
    }

    #[test]
    fn song_form_limits_language_to_two_letters() {
        let mut form = SongForm::default();
        form.toggle_field();
        assert!(form.push_char('f'));
        assert!(!form.push_char('1'));
        assert!(form.push_char('R'));
        assert!(!form.push_char('x'));
        assert_eq!(form.language, "fR");

        form.toggle_field();
        form.toggle_field();
        for ch in "La Vie".chars() {
            form.push_char(ch);
        }
        let (draft, artist) = form.parse_inputs().unwrap();
        assert_eq!(draft.language.as_deref(), Some("fr"));
        assert_eq!(artist, None);
    }

    #[test]
    fn layout_form_cycles_papers() {
        let mut form = LayoutForm::new(vec![
            Papersize::new("A4", 210, 297),
            Papersize::new("A5", 148, 210),
        ]);
        form.cycle(false);
        assert_eq!(form.paper_index, 1);
        form.toggle_field();
        form.toggle_field();
        form.cycle(true);

        let layout = form.build("alice").unwrap();
        assert_eq!(layout.name().unwrap(), "A5 Landscape");
    }
}
