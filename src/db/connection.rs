use std::fs;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config::Config;

/// Open (creating if needed) the database named by the configuration and
/// bring its schema up to date.
pub fn open_database(config: &Config) -> Result<Connection> {
    let db_path = config.database_path();

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(&db_path).context("failed to open SQLite database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Fresh in-memory database with the full schema.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create missing tables, switch foreign keys on for this connection and seed
/// the default papersizes.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .context("failed to create artists table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            language TEXT,
            artist_id INTEGER REFERENCES artists(id) ON DELETE SET NULL,
            file_path TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create songs table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create sections table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS songbooks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            is_public INTEGER NOT NULL DEFAULT 0,
            owner TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create songbooks table")?;

    // item_type/item_id point into the table named by the item kind, so there
    // is no foreign key on them; deletes of songs and sections clean up here.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS songbook_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            songbook_id INTEGER NOT NULL,
            item_type TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            UNIQUE (item_type, item_id, songbook_id),
            FOREIGN KEY(songbook_id) REFERENCES songbooks(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create songbook_items table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS papersizes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            margin_top INTEGER NOT NULL DEFAULT 15,
            margin_right INTEGER NOT NULL DEFAULT 15,
            margin_bottom INTEGER NOT NULL DEFAULT 15,
            margin_left INTEGER NOT NULL DEFAULT 15,
            binding_offset INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )
    .context("failed to create papersizes table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS layouts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            booktype TEXT NOT NULL DEFAULT 'chorded',
            papersize_id INTEGER NOT NULL REFERENCES papersizes(id),
            bookoptions TEXT NOT NULL DEFAULT '{}',
            other_options TEXT NOT NULL DEFAULT '{}',
            template TEXT NOT NULL DEFAULT 'data.tex'
        )",
        [],
    )
    .context("failed to create layouts table")?;

    super::layouts::seed_papersizes(conn)?;

    Ok(())
}
