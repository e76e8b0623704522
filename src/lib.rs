//! Core library surface for the Songbook Manager.
//!
//! Songbooks are ordered lists of songs and section headings. The library
//! keeps their ranks, computes paper geometry for a layout, and turns both
//! into the descriptions consumed by an external typesetting engine. The
//! `ui` module is the terminal front-end built on top of it.
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layout;
pub mod library;
pub mod models;
pub mod registry;
pub mod serializer;
pub mod slug;
pub mod ui;
pub mod validators;

pub use config::Config;
pub use db::{open_database, open_in_memory};
pub use error::SongbookError;
pub use geometry::Papersize;
pub use layout::{BookType, ColumnAdjustment, Layout, Orientation};
pub use library::SongLibrary;
pub use models::{ItemRef, ItemSlot, Section, SectionName, Song, SongBook, SongDraft};
pub use registry::ItemKind;
pub use serializer::{describe_songbook, SongbookDescription};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
