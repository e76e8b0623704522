use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use log::error;
use open::that as open_link;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use rusqlite::Connection;

use crate::config::Config;
use crate::db::{
    add_section, add_song, create_layout, create_song, create_songbook, delete_layout,
    delete_song, delete_songbook, fetch_layouts, fetch_papersizes, fetch_song, fill_holes,
    find_or_create_artist, move_item, remove_item, update_songbook, MoveDirection,
};
use crate::export::export_songbook;
use crate::library::SongLibrary;
use crate::models::ItemRef;
use crate::registry::ItemKind;

use super::forms::{
    ConfirmDelete, LayoutField, LayoutForm, SectionForm, SongField, SongForm, SongbookField,
    SongbookForm,
};
use super::helpers::{centered_rect, key_hints, step_selection, surface_error};
use super::screens::{
    layout_label, AddSongState, ItemsScreen, LayoutPicker, LayoutsScreen, SongLibraryScreen,
    SongbookSummary,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;

/// Top-level screens.
enum Screen {
    Songbooks,
    Items(ItemsScreen),
    Songs(SongLibraryScreen),
    Layouts(LayoutsScreen),
}

/// What a pending confirmation will remove.
#[derive(Clone, Copy)]
enum DeleteTarget {
    Songbook,
    /// An item slot; the confirmation id is the songbook.
    Item(ItemRef),
    Song,
    Layout,
}

/// Modal state layered over the current screen.
enum Mode {
    Normal,
    AddingSongbook(SongbookForm),
    EditingSongbook { id: i64, form: SongbookForm },
    AddingSection(SectionForm),
    SelectingSongs(AddSongState),
    CreatingSong(SongForm),
    CreatingLayout(LayoutForm),
    ChoosingLayout(LayoutPicker),
    Confirming {
        target: DeleteTarget,
        confirm: ConfirmDelete,
    },
}

struct StatusMessage {
    text: String,
    kind: StatusKind,
}

enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    config: Config,
    library: SongLibrary,
    songbooks: Vec<SongbookSummary>,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(conn: Connection, config: Config, library: SongLibrary) -> Result<Self> {
        let songbooks = SongbookSummary::load_all(&conn)?;
        Ok(Self {
            conn,
            config,
            library,
            songbooks,
            selected: 0,
            screen: Screen::Songbooks,
            mode: Mode::Normal,
            status: None,
        })
    }

    /// Process one key press. Returns `true` when the application should exit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingSongbook(form) => self.handle_songbook_form(code, None, form)?,
            Mode::EditingSongbook { id, form } => {
                self.handle_songbook_form(code, Some(id), form)?
            }
            Mode::AddingSection(form) => self.handle_section_form(code, form)?,
            Mode::SelectingSongs(state) => self.handle_select_songs(code, state)?,
            Mode::CreatingSong(form) => self.handle_song_form(code, form)?,
            Mode::CreatingLayout(form) => self.handle_layout_form(code, form)?,
            Mode::ChoosingLayout(picker) => self.handle_layout_picker(code, picker)?,
            Mode::Confirming { target, confirm } => self.handle_confirm(code, target, confirm)?,
        };
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let screen = mem::replace(&mut self.screen, Screen::Songbooks);
        let (screen, mode) = match screen {
            Screen::Songbooks => self.handle_songbooks_key(code, exit)?,
            Screen::Items(items) => self.handle_items_key(code, items)?,
            Screen::Songs(songs) => self.handle_songs_key(code, songs)?,
            Screen::Layouts(layouts) => self.handle_layouts_key(code, layouts)?,
        };
        self.screen = screen;
        Ok(mode)
    }

    fn handle_songbooks_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<(Screen, Mode)> {
        let stay = Screen::Songbooks;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-5),
            KeyCode::PageDown => self.move_selection(5),
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok((stay, Mode::AddingSongbook(SongbookForm::default())));
            }
            KeyCode::Char('e') => {
                if let Some(summary) = self.songbooks.get(self.selected) {
                    let mode = Mode::EditingSongbook {
                        id: summary.book.id,
                        form: SongbookForm::from_songbook(&summary.book),
                    };
                    self.clear_status();
                    return Ok((stay, mode));
                }
                self.set_status("No songbook selected.", StatusKind::Error);
            }
            KeyCode::Char('-') => {
                if let Some(summary) = self.songbooks.get(self.selected) {
                    let mode = Mode::Confirming {
                        target: DeleteTarget::Songbook,
                        confirm: ConfirmDelete {
                            id: summary.book.id,
                            label: summary.book.to_string(),
                        },
                    };
                    return Ok((stay, mode));
                }
                self.set_status("No songbook selected.", StatusKind::Error);
            }
            KeyCode::Enter => {
                let Some(id) = self.songbooks.get(self.selected).map(|s| s.book.id) else {
                    self.set_status("No songbook selected.", StatusKind::Error);
                    return Ok((stay, Mode::Normal));
                };
                if let Some(items) = self.report(ItemsScreen::load(&self.conn, id)) {
                    self.clear_status();
                    return Ok((Screen::Items(items), Mode::Normal));
                }
            }
            KeyCode::Char('s') => {
                if let Some(songs) = self.report(SongLibraryScreen::load(&self.conn)) {
                    self.clear_status();
                    return Ok((Screen::Songs(songs), Mode::Normal));
                }
            }
            KeyCode::Char('l') => {
                let loaded = LayoutsScreen::load(&self.conn, &self.config.owner);
                if let Some(layouts) = self.report(loaded) {
                    self.clear_status();
                    return Ok((Screen::Layouts(layouts), Mode::Normal));
                }
            }
            _ => {}
        }
        Ok((stay, Mode::Normal))
    }

    fn handle_items_key(
        &mut self,
        code: KeyCode,
        mut items: ItemsScreen,
    ) -> Result<(Screen, Mode)> {
        let songbook_id = items.songbook.id;
        match code {
            KeyCode::Esc => {
                self.clear_status();
                self.reload_songbooks(Some(songbook_id))?;
                return Ok((Screen::Songbooks, Mode::Normal));
            }
            KeyCode::Up => items.move_selection(-1),
            KeyCode::Down => items.move_selection(1),
            KeyCode::PageUp => items.move_selection(-5),
            KeyCode::PageDown => items.move_selection(5),
            KeyCode::Char('a') => {
                if let Some(state) = self.report(AddSongState::load(&self.conn, songbook_id)) {
                    if state.songs.is_empty() {
                        self.set_status(
                            "Every song in the library is already in this songbook.",
                            StatusKind::Info,
                        );
                    } else {
                        self.clear_status();
                        return Ok((Screen::Items(items), Mode::SelectingSongs(state)));
                    }
                }
            }
            KeyCode::Char('n') => {
                self.clear_status();
                let form = SectionForm::new(songbook_id);
                return Ok((Screen::Items(items), Mode::AddingSection(form)));
            }
            KeyCode::Char('-') => {
                if let Some(entry) = items.current() {
                    let mode = Mode::Confirming {
                        target: DeleteTarget::Item(entry.slot.item),
                        confirm: ConfirmDelete {
                            id: songbook_id,
                            label: entry.label.clone(),
                        },
                    };
                    return Ok((Screen::Items(items), mode));
                }
                self.set_status("This songbook is empty.", StatusKind::Error);
            }
            KeyCode::Char('K') => self.move_current_item(&mut items, MoveDirection::Up),
            KeyCode::Char('J') => self.move_current_item(&mut items, MoveDirection::Down),
            KeyCode::Char('f') => {
                let outcome = fill_holes(&self.conn, songbook_id)
                    .and_then(|changed| items.reload(&self.conn).map(|_| changed));
                match self.report(outcome) {
                    Some(0) => self.set_status("Ranks are already contiguous.", StatusKind::Info),
                    Some(changed) => {
                        self.set_status(format!("Renumbered {changed} items."), StatusKind::Info)
                    }
                    None => {}
                }
            }
            KeyCode::Char('x') => {
                let loaded = fetch_layouts(&self.conn, Some(&self.config.owner));
                if let Some(layouts) = self.report(loaded) {
                    if layouts.is_empty() {
                        self.set_status(
                            "No layouts yet. Create one from the layouts screen.",
                            StatusKind::Error,
                        );
                    } else {
                        self.clear_status();
                        let picker = LayoutPicker {
                            songbook_id,
                            layouts,
                            selected: 0,
                        };
                        return Ok((Screen::Items(items), Mode::ChoosingLayout(picker)));
                    }
                }
            }
            KeyCode::Char('o') => match items.current().map(|entry| entry.slot.item) {
                Some(ItemRef {
                    kind: ItemKind::Song,
                    id,
                }) => self.open_song_file(id),
                Some(_) => self.set_status("Sections have no source file.", StatusKind::Error),
                None => self.set_status("This songbook is empty.", StatusKind::Error),
            },
            _ => {}
        }
        Ok((Screen::Items(items), Mode::Normal))
    }

    fn handle_songs_key(
        &mut self,
        code: KeyCode,
        mut songs: SongLibraryScreen,
    ) -> Result<(Screen, Mode)> {
        match code {
            KeyCode::Esc => {
                self.clear_status();
                self.reload_songbooks(None)?;
                return Ok((Screen::Songbooks, Mode::Normal));
            }
            KeyCode::Up => songs.move_selection(-1),
            KeyCode::Down => songs.move_selection(1),
            KeyCode::PageUp => songs.move_selection(-5),
            KeyCode::PageDown => songs.move_selection(5),
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok((Screen::Songs(songs), Mode::CreatingSong(SongForm::default())));
            }
            KeyCode::Char('-') => {
                if let Some(song) = songs.current() {
                    let mode = Mode::Confirming {
                        target: DeleteTarget::Song,
                        confirm: ConfirmDelete {
                            id: song.id,
                            label: song.title.clone(),
                        },
                    };
                    return Ok((Screen::Songs(songs), mode));
                }
                self.set_status("No song selected.", StatusKind::Error);
            }
            KeyCode::Char('o') => match songs.current().map(|song| song.id) {
                Some(id) => self.open_song_file(id),
                None => self.set_status("No song selected.", StatusKind::Error),
            },
            _ => {}
        }
        Ok((Screen::Songs(songs), Mode::Normal))
    }

    fn handle_layouts_key(
        &mut self,
        code: KeyCode,
        mut layouts: LayoutsScreen,
    ) -> Result<(Screen, Mode)> {
        match code {
            KeyCode::Esc => {
                self.clear_status();
                return Ok((Screen::Songbooks, Mode::Normal));
            }
            KeyCode::Up => layouts.move_selection(-1),
            KeyCode::Down => layouts.move_selection(1),
            KeyCode::Char('+') => {
                if let Some(papersizes) = self.report(fetch_papersizes(&self.conn)) {
                    self.clear_status();
                    let form = LayoutForm::new(papersizes);
                    return Ok((Screen::Layouts(layouts), Mode::CreatingLayout(form)));
                }
            }
            KeyCode::Char('-') => {
                if let Some(layout) = layouts.current() {
                    let mode = Mode::Confirming {
                        target: DeleteTarget::Layout,
                        confirm: ConfirmDelete {
                            id: layout.id,
                            label: layout_label(layout),
                        },
                    };
                    return Ok((Screen::Layouts(layouts), mode));
                }
                self.set_status("No layout selected.", StatusKind::Error);
            }
            _ => {}
        }
        Ok((Screen::Layouts(layouts), Mode::Normal))
    }

    fn handle_songbook_form(
        &mut self,
        code: KeyCode,
        id: Option<i64>,
        mut form: SongbookForm,
    ) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_songbook(id, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        Ok(match (keep_open, id) {
            (false, _) => Mode::Normal,
            (true, Some(id)) => Mode::EditingSongbook { id, form },
            (true, None) => Mode::AddingSongbook(form),
        })
    }

    fn handle_section_form(&mut self, code: KeyCode, mut form: SectionForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("New section cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_section(&form) {
                Ok(_) => return Ok(Mode::Normal),
                Err(err) => form.error = Some(surface_error(&err)),
            },
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        }
        Ok(Mode::AddingSection(form))
    }

    fn handle_select_songs(&mut self, code: KeyCode, mut state: AddSongState) -> Result<Mode> {
        match code {
            KeyCode::Esc => return Ok(Mode::Normal),
            KeyCode::Up => state.move_selection(-1),
            KeyCode::Down => state.move_selection(1),
            KeyCode::PageUp => state.move_selection(-5),
            KeyCode::PageDown => state.move_selection(5),
            KeyCode::Char(' ') => state.toggle_current(),
            KeyCode::Enter => {
                let mut added = 0usize;
                for song_id in state.chosen() {
                    if let Err(err) = add_song(&self.conn, state.songbook_id, song_id, None) {
                        self.refresh_items()?;
                        self.set_status(surface_error(&err), StatusKind::Error);
                        return Ok(Mode::Normal);
                    }
                    added += 1;
                }
                self.refresh_items()?;
                let message = if added == 1 {
                    "Song added to songbook.".to_string()
                } else {
                    format!("Added {added} songs to songbook.")
                };
                self.set_status(message, StatusKind::Info);
                return Ok(Mode::Normal);
            }
            _ => {}
        }
        Ok(Mode::SelectingSongs(state))
    }

    fn handle_song_form(&mut self, code: KeyCode, mut form: SongForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("New song cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_song(&form) {
                Ok(_) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::CreatingSong(form))
    }

    fn handle_layout_form(&mut self, code: KeyCode, mut form: LayoutForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("New layout cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => form.toggle_field(),
            KeyCode::Left => form.cycle(false),
            KeyCode::Right | KeyCode::Char(' ') => form.cycle(true),
            KeyCode::Enter => {
                let created = form
                    .build(&self.config.owner)
                    .and_then(|layout| create_layout(&self.conn, &layout));
                if let Some(layout) = self.report(created) {
                    self.refresh_layouts()?;
                    let name = layout.name().unwrap_or_else(|_| layout.papersize.name.clone());
                    self.set_status(format!("Created layout {name}."), StatusKind::Info);
                    return Ok(Mode::Normal);
                }
            }
            _ => {}
        }
        Ok(Mode::CreatingLayout(form))
    }

    fn handle_layout_picker(&mut self, code: KeyCode, mut picker: LayoutPicker) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Export cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Up => picker.move_selection(-1),
            KeyCode::Down => picker.move_selection(1),
            KeyCode::Enter => {
                let Some(layout_id) = picker.current().map(|layout| layout.id) else {
                    return Ok(Mode::Normal);
                };
                let exported =
                    export_songbook(&self.conn, &self.config, picker.songbook_id, layout_id);
                if let Some(path) = self.report(exported) {
                    self.set_status(format!("Exported to {}.", path.display()), StatusKind::Info);
                }
                return Ok(Mode::Normal);
            }
            _ => {}
        }
        Ok(Mode::ChoosingLayout(picker))
    }

    fn handle_confirm(
        &mut self,
        code: KeyCode,
        target: DeleteTarget,
        confirm: ConfirmDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_delete(target, &confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::Confirming { target, confirm })
                    }
                }
            }
            _ => Ok(Mode::Confirming { target, confirm }),
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Songbooks => self.draw_songbooks(frame, content_area),
            Screen::Items(items) => self.draw_items(frame, content_area, items),
            Screen::Songs(songs) => self.draw_songs(frame, content_area, songs),
            Screen::Layouts(layouts) => self.draw_layouts(frame, content_area, layouts),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingSongbook(form) => {
                self.draw_songbook_form(frame, area, "New Songbook", form)
            }
            Mode::EditingSongbook { form, .. } => {
                self.draw_songbook_form(frame, area, "Edit Songbook", form)
            }
            Mode::AddingSection(form) => self.draw_section_form(frame, area, form),
            Mode::SelectingSongs(state) => self.draw_add_songs(frame, area, state),
            Mode::CreatingSong(form) => self.draw_song_form(frame, area, form),
            Mode::CreatingLayout(form) => self.draw_layout_form(frame, area, form),
            Mode::ChoosingLayout(picker) => self.draw_layout_picker(frame, area, picker),
            Mode::Confirming { target, confirm } => {
                self.draw_confirm(frame, area, *target, confirm)
            }
            Mode::Normal => {}
        }
    }

    fn draw_songbooks(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Songbooks");
        if self.songbooks.is_empty() {
            let message = Paragraph::new("No songbooks yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = self
            .songbooks
            .iter()
            .map(|summary| {
                let visibility = if summary.book.is_public { "public" } else { "private" };
                ListItem::new(vec![
                    Line::from(vec![
                        Span::styled(
                            summary.book.to_string(),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!("  ({visibility})"),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ]),
                    Line::from(Span::styled(
                        format!("  {}", summary.counts_line()),
                        Style::default().fg(Color::Gray),
                    )),
                ])
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_items(&self, frame: &mut Frame, area: Rect, items: &ItemsScreen) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);

        let mut header = vec![Line::from(Span::styled(
            items.songbook.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if !items.songbook.description.is_empty() {
            header.push(Line::from(items.songbook.description.replace('\n', " ")));
        }
        if !items.is_dense() {
            header.push(Line::from(Span::styled(
                "Ranks have gaps or ties. Press f to renumber.",
                Style::default().fg(Color::Yellow),
            )));
        }
        let header = Paragraph::new(header)
            .block(Block::default().borders(Borders::BOTTOM))
            .wrap(Wrap { trim: true });
        frame.render_widget(header, chunks[0]);

        if items.entries.is_empty() {
            let message =
                Paragraph::new("Empty songbook. Press 'a' to add songs or 'n' for a section.")
                    .alignment(Alignment::Center);
            frame.render_widget(message, chunks[1]);
            return;
        }

        let rows: Vec<ListItem> = items
            .entries
            .iter()
            .map(|entry| {
                let style = match entry.slot.item.kind {
                    ItemKind::Song => Style::default(),
                    ItemKind::Section => Style::default().fg(Color::Cyan),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:>4}  ", entry.slot.rank),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(entry.label.clone(), style),
                ]))
            })
            .collect();

        let list = List::new(rows)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(items.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_songs(&self, frame: &mut Frame, area: Rect, songs: &SongLibraryScreen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Song library ({})", self.library.root().display()));
        if songs.songs.is_empty() {
            let message = Paragraph::new("No songs yet. Press '+' to create one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let rows: Vec<ListItem> = songs
            .songs
            .iter()
            .map(|song| {
                ListItem::new(vec![
                    Line::from(songs.describe(song)),
                    Line::from(Span::styled(
                        format!("  {}", song.file_path),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            })
            .collect();

        let list = List::new(rows)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(songs.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_layouts(&self, frame: &mut Frame, area: Rect, layouts: &LayoutsScreen) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Layouts of {}", self.config.owner));
        if layouts.layouts.is_empty() {
            let message = Paragraph::new("No layouts yet. Press '+' to create one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let rows: Vec<ListItem> = layouts
            .layouts
            .iter()
            .map(|layout| {
                let detail = match layout.column_adjustment() {
                    Ok(adjustment) => format!(
                        "  {}×{} mm • columns: {}",
                        layout.papersize.width,
                        layout.papersize.height,
                        adjustment.as_str()
                    ),
                    Err(err) => format!("  {err}"),
                };
                ListItem::new(vec![
                    Line::from(layout_label(layout)),
                    Line::from(Span::styled(detail, Style::default().fg(Color::DarkGray))),
                ])
            })
            .collect();

        let list = List::new(rows)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(layouts.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        match (&self.screen, &self.mode) {
            (_, Mode::SelectingSongs(_)) => key_hints(&[
                ("↑↓", "Navigate"),
                ("Space", "Toggle"),
                ("Enter", "Add"),
                ("Esc", "Cancel"),
            ]),
            (_, Mode::ChoosingLayout(_)) => {
                key_hints(&[("↑↓", "Navigate"), ("Enter", "Export"), ("Esc", "Cancel")])
            }
            (_, Mode::CreatingLayout(_)) => key_hints(&[
                ("Tab", "Next field"),
                ("←→", "Change"),
                ("Enter", "Save"),
                ("Esc", "Cancel"),
            ]),
            (_, Mode::Confirming { .. }) => key_hints(&[("y", "Confirm"), ("n", "Cancel")]),
            (_, Mode::AddingSongbook(_))
            | (_, Mode::EditingSongbook { .. })
            | (_, Mode::CreatingSong(_)) => {
                key_hints(&[("Tab", "Next field"), ("Enter", "Save"), ("Esc", "Cancel")])
            }
            (_, Mode::AddingSection(_)) => key_hints(&[("Enter", "Save"), ("Esc", "Cancel")]),
            (Screen::Songbooks, Mode::Normal) => key_hints(&[
                ("+", "Add"),
                ("e", "Edit"),
                ("-", "Delete"),
                ("Enter", "Open"),
                ("s", "Songs"),
                ("l", "Layouts"),
                ("q", "Quit"),
            ]),
            (Screen::Items(_), Mode::Normal) => key_hints(&[
                ("a", "Add songs"),
                ("n", "New section"),
                ("-", "Remove"),
                ("K/J", "Move"),
                ("f", "Fill holes"),
                ("x", "Export"),
                ("o", "Open file"),
                ("Esc", "Back"),
            ]),
            (Screen::Songs(_), Mode::Normal) => key_hints(&[
                ("+", "New song"),
                ("-", "Delete"),
                ("o", "Open file"),
                ("Esc", "Back"),
            ]),
            (Screen::Layouts(_), Mode::Normal) => {
                key_hints(&[("+", "New layout"), ("-", "Delete"), ("Esc", "Back")])
            }
        }
    }

    fn draw_songbook_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &SongbookForm) {
        let popup_area = centered_rect(60, 40, area);
        let inner = self.draw_popup(frame, popup_area, title);

        let mut lines = form.lines();
        lines.push(Line::from(""));
        lines.push(form_footer(form.error.as_deref(), "Space toggles public"));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let (row, label, value) = match form.active {
            SongbookField::Title => (0, "Title", form.title.clone()),
            SongbookField::Description => {
                (1, "Description", form.description.replace('\n', " ⏎ "))
            }
            SongbookField::Public => return,
        };
        frame.set_cursor_position(field_cursor(inner, row, label, &value));
    }

    fn draw_section_form(&self, frame: &mut Frame, area: Rect, form: &SectionForm) {
        let popup_area = centered_rect(60, 30, area);
        let inner = self.draw_popup(frame, popup_area, "New Section");

        let mut lines = form.lines();
        lines.push(Line::from(""));
        lines.push(form_footer(form.error.as_deref(), "Appended at the end"));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
        frame.set_cursor_position(field_cursor(inner, 0, "Name", &form.name));
    }

    fn draw_song_form(&self, frame: &mut Frame, area: Rect, form: &SongForm) {
        let popup_area = centered_rect(60, 40, area);
        let inner = self.draw_popup(frame, popup_area, "New Song");

        let mut lines = form.lines();
        lines.push(Line::from(""));
        lines.push(form_footer(form.error.as_deref(), "Artist is created if unknown"));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let (row, label, value) = match form.active {
            SongField::Title => (0, "Title", &form.title),
            SongField::Language => (1, "Language", &form.language),
            SongField::Artist => (2, "Artist", &form.artist),
        };
        frame.set_cursor_position(field_cursor(inner, row, label, value));
    }

    fn draw_layout_form(&self, frame: &mut Frame, area: Rect, form: &LayoutForm) {
        let popup_area = centered_rect(60, 40, area);
        let inner = self.draw_popup(frame, popup_area, "New Layout");

        let mut lines = form.lines();
        lines.push(Line::from(""));
        let hint = match form.active {
            LayoutField::Papersize => "Seeded sizes: A4, A5, Letter",
            LayoutField::BookType => "Lyrics only hides chords",
            LayoutField::Orientation => "Landscape rotates the margins",
        };
        lines.push(form_footer(None, hint));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
    }

    fn draw_add_songs(&self, frame: &mut Frame, area: Rect, state: &AddSongState) {
        let popup_area = centered_rect(70, 50, area);
        let inner = self.draw_popup(frame, popup_area, "Add Songs");

        let items: Vec<ListItem> = state
            .songs
            .iter()
            .map(|song| {
                let checkbox = if state.checked.contains(&song.id) {
                    "[x]"
                } else {
                    "[ ]"
                };
                ListItem::new(format!("{checkbox} {song}"))
            })
            .collect();

        let list = List::new(items)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        list_state.select(Some(state.selected));
        frame.render_stateful_widget(list, inner, &mut list_state);
    }

    fn draw_layout_picker(&self, frame: &mut Frame, area: Rect, picker: &LayoutPicker) {
        let popup_area = centered_rect(60, 40, area);
        let inner = self.draw_popup(frame, popup_area, "Export With Layout");

        let items: Vec<ListItem> = picker
            .layouts
            .iter()
            .map(|layout| ListItem::new(layout_label(layout)))
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        list_state.select(Some(picker.selected));
        frame.render_stateful_widget(list, inner, &mut list_state);
    }

    fn draw_confirm(
        &self,
        frame: &mut Frame,
        area: Rect,
        target: DeleteTarget,
        confirm: &ConfirmDelete,
    ) {
        let popup_area = centered_rect(60, 30, area);
        let (title, question, detail) = match target {
            DeleteTarget::Songbook => (
                "Delete Songbook",
                format!("Delete {}?", confirm.label),
                "Songs and sections stay in the library.",
            ),
            DeleteTarget::Item(_) => (
                "Remove Item",
                format!("Remove {} from this songbook?", confirm.label),
                "Remaining ranks are kept; press f afterwards to close the gap.",
            ),
            DeleteTarget::Song => (
                "Delete Song",
                format!("Delete \"{}\"?", confirm.label),
                "It is removed from every songbook and its source file is deleted.",
            ),
            DeleteTarget::Layout => (
                "Delete Layout",
                format!("Delete layout {}?", confirm.label),
                "Songbooks are not affected.",
            ),
        };
        let inner = self.draw_popup(frame, popup_area, title);

        let lines = vec![
            Line::from(question),
            Line::from(detail),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    /// Clear `popup_area`, draw a bordered block and return its inner area.
    fn draw_popup(&self, frame: &mut Frame, popup_area: Rect, title: &str) -> Rect {
        frame.render_widget(Clear, popup_area);
        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        block.inner(popup_area)
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    /// Surface a failed operation in the footer instead of aborting the loop.
    fn report<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                error!("{err:#}");
                self.set_status(surface_error(&err), StatusKind::Error);
                None
            }
        }
    }

    fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.songbooks.len(), offset);
    }

    fn move_current_item(&mut self, items: &mut ItemsScreen, direction: MoveDirection) {
        let Some(slot_id) = items.current().map(|entry| entry.slot.id) else {
            return;
        };
        let moved = move_item(&self.conn, slot_id, direction)
            .and_then(|moved| items.reload(&self.conn).map(|_| moved));
        match self.report(moved) {
            Some(true) => self.clear_status(),
            Some(false) => self.set_status("Already at the edge.", StatusKind::Info),
            None => {}
        }
    }

    fn open_song_file(&mut self, song_id: i64) {
        let Some(song) = self.report(fetch_song(&self.conn, song_id)) else {
            return;
        };
        let path = self.library.absolute_path(&song.file_path);
        if let Err(err) = open_link(&path) {
            self.set_status(
                format!("Failed to open {}: {err}", path.display()),
                StatusKind::Error,
            );
        } else {
            self.set_status(format!("Opened {}.", song.title), StatusKind::Info);
        }
    }

    fn save_songbook(&mut self, id: Option<i64>, form: &SongbookForm) -> Result<()> {
        let (title, description, is_public) = form.parse_inputs()?;
        let id = match id {
            Some(id) => {
                update_songbook(&self.conn, id, &title, &description, is_public)?;
                self.set_status(format!("Updated {title}."), StatusKind::Info);
                id
            }
            None => {
                let book = create_songbook(
                    &self.conn,
                    &title,
                    &description,
                    is_public,
                    &self.config.owner,
                )?;
                self.set_status(format!("Added {book}."), StatusKind::Info);
                book.id
            }
        };
        self.reload_songbooks(Some(id))
    }

    fn save_section(&mut self, form: &SectionForm) -> Result<()> {
        let name = form.parse_inputs()?;
        let (section, slot) = add_section(&self.conn, form.songbook_id, name.as_str(), None)?;
        self.refresh_items()?;
        self.set_status(
            format!("Added section {} at rank {}.", section.name, slot.rank),
            StatusKind::Info,
        );
        Ok(())
    }

    fn save_new_song(&mut self, form: &SongForm) -> Result<()> {
        let (mut draft, artist) = form.parse_inputs()?;
        if let Some(name) = &artist {
            draft = draft.with_artist(find_or_create_artist(&self.conn, name)?.id);
        }
        let text = blank_song_text(&draft.title, artist.as_deref());
        let song = create_song(&self.conn, &self.library, &draft, &text)?;
        if let Screen::Songs(ref mut songs) = self.screen {
            songs.reload(&self.conn)?;
            if let Some(index) = songs.songs.iter().position(|s| s.id == song.id) {
                songs.selected = index;
            }
        }
        self.set_status(
            format!("Created {} at {}.", song.title, song.file_path),
            StatusKind::Info,
        );
        Ok(())
    }

    fn perform_delete(&mut self, target: DeleteTarget, confirm: &ConfirmDelete) -> Result<()> {
        match target {
            DeleteTarget::Songbook => {
                delete_songbook(&self.conn, confirm.id)?;
                self.reload_songbooks(None)?;
            }
            DeleteTarget::Item(item) => {
                remove_item(&self.conn, confirm.id, item)?;
                self.refresh_items()?;
            }
            DeleteTarget::Song => {
                delete_song(&self.conn, &self.library, confirm.id)?;
                if let Screen::Songs(ref mut songs) = self.screen {
                    songs.reload(&self.conn)?;
                }
            }
            DeleteTarget::Layout => {
                delete_layout(&self.conn, confirm.id)?;
                self.refresh_layouts()?;
            }
        }
        self.set_status(format!("Deleted {}.", confirm.label), StatusKind::Info);
        Ok(())
    }

    fn reload_songbooks(&mut self, focus_id: Option<i64>) -> Result<()> {
        self.songbooks = SongbookSummary::load_all(&self.conn)?;
        if let Some(id) = focus_id {
            if let Some(index) = self.songbooks.iter().position(|s| s.book.id == id) {
                self.selected = index;
            }
        }
        self.selected = step_selection(self.selected, self.songbooks.len(), 0);
        Ok(())
    }

    fn refresh_items(&mut self) -> Result<()> {
        if let Screen::Items(ref mut items) = self.screen {
            items.reload(&self.conn)?;
        }
        Ok(())
    }

    fn refresh_layouts(&mut self) -> Result<()> {
        if let Screen::Layouts(ref mut layouts) = self.screen {
            let selected = layouts.selected;
            *layouts = LayoutsScreen::load(&self.conn, &self.config.owner)?;
            layouts.move_selection(selected as isize);
        }
        Ok(())
    }
}

/// Error line when present, otherwise the key reminder plus a hint.
fn form_footer(error: Option<&str>, hint: &str) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            format!("Enter to save • Esc to cancel • {hint}"),
            Style::default().fg(Color::Gray),
        )),
    }
}

/// Cursor position at the end of a `label: value` form line.
fn field_cursor(inner: Rect, row: u16, label: &str, value: &str) -> (u16, u16) {
    let prefix = label.chars().count() as u16 + 2;
    (
        inner.x + prefix + value.chars().count() as u16,
        inner.y + row,
    )
}

/// Source text written for a freshly created song.
fn blank_song_text(title: &str, artist: Option<&str>) -> String {
    let by = artist.map(|name| format!("[by={{{name}}}]")).unwrap_or_default();
    format!("\\beginsong{{{title}}}{by}\n\n\\endsong\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn test_app(dir: &tempfile::TempDir) -> App {
        let config = Config::with_data_dir(dir.path());
        let library = SongLibrary::new(&config.library_dir);
        App::new(open_in_memory().unwrap(), config, library).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    #[test]
    fn blank_song_text_names_artist() {
        assert_eq!(
            blank_song_text("Hey Jude", Some("The Beatles")),
            "\\beginsong{Hey Jude}[by={The Beatles}]\n\n\\endsong\n"
        );
        assert_eq!(blank_song_text("Air", None), "\\beginsong{Air}\n\n\\endsong\n");
    }

    #[test]
    fn creating_a_songbook_from_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(&mut app, "Camp");
        app.handle_key(KeyCode::Enter).unwrap();

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.songbooks.len(), 1);
        assert_eq!(app.songbooks[0].book.title, "Camp");
        assert_eq!(app.songbooks[0].book.owner, app.config.owner);
    }

    #[test]
    fn invalid_section_keeps_form_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        create_songbook(&app.conn, "Camp", "", false, "alice").unwrap();
        app.reload_songbooks(None).unwrap();

        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.screen, Screen::Items(_)));

        app.handle_key(KeyCode::Char('n')).unwrap();
        type_text(&mut app, "A & B");
        app.handle_key(KeyCode::Enter).unwrap();
        match &app.mode {
            Mode::AddingSection(form) => assert!(form.error.is_some()),
            _ => panic!("section form should stay open"),
        }

        app.handle_key(KeyCode::Esc).unwrap();
        app.handle_key(KeyCode::Char('n')).unwrap();
        type_text(&mut app, "Intro");
        app.handle_key(KeyCode::Enter).unwrap();
        match &app.screen {
            Screen::Items(items) => {
                assert_eq!(items.entries.len(), 1);
                assert_eq!(items.entries[0].slot.rank, 1);
            }
            _ => panic!("expected the items screen"),
        }
    }

    #[test]
    fn quitting_from_the_songbook_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        assert!(!app.handle_key(KeyCode::Char('s')).unwrap());
        assert!(!app.handle_key(KeyCode::Esc).unwrap());
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }
}
