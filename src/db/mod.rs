//! Persistence module split across logical submodules.

mod connection;
mod items;
mod layouts;
mod sections;
mod songbooks;
mod songs;

pub use connection::{ensure_schema, open_database, open_in_memory};
pub use items::{
    add_item, add_section, add_song, count_by_kind, count_distinct_artists, count_items,
    count_sections, count_songs, fetch_slots, fill_holes, move_item, remove_item, set_item_rank,
    MoveDirection,
};
pub use layouts::{
    create_layout, create_papersize, delete_layout, fetch_layout, fetch_layouts, fetch_papersize,
    fetch_papersizes, update_layout,
};
pub use sections::{create_section, delete_section, fetch_section, rename_section};
pub use songbooks::{
    create_songbook, delete_songbook, fetch_songbook, fetch_songbooks, update_songbook,
};
pub use songs::{
    create_artist, create_song, delete_song, fetch_all_songs, fetch_artists,
    fetch_available_songs, fetch_song, find_or_create_artist, update_song, update_song_text,
};
