use anyhow::{anyhow, Context, Result};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::SongBook;
use crate::slug::{unique_slug, SlugTable};

const SONGBOOK_COLUMNS: &str = "id, title, slug, description, is_public, owner";

fn songbook_from_row(row: &Row<'_>) -> rusqlite::Result<SongBook> {
    Ok(SongBook {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        is_public: row.get(4)?,
        owner: row.get(5)?,
    })
}

/// Retrieve every songbook, alphabetically by title.
pub fn fetch_songbooks(conn: &Connection) -> Result<Vec<SongBook>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SONGBOOK_COLUMNS} FROM songbooks ORDER BY title COLLATE NOCASE, id"
        ))
        .context("failed to prepare songbook query")?;

    let songbooks = stmt
        .query_map([], songbook_from_row)
        .context("failed to load songbooks")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect songbooks")?;

    Ok(songbooks)
}

pub fn fetch_songbook(conn: &Connection, id: i64) -> Result<SongBook> {
    conn.query_row(
        &format!("SELECT {SONGBOOK_COLUMNS} FROM songbooks WHERE id = ?1"),
        params![id],
        songbook_from_row,
    )
    .optional()
    .context("failed to load songbook")?
    .ok_or_else(|| anyhow!("Songbook not found"))
}

/// Insert a new songbook, returning the hydrated struct so the caller can
/// push it straight into the in-memory list.
pub fn create_songbook(
    conn: &Connection,
    title: &str,
    description: &str,
    is_public: bool,
    owner: &str,
) -> Result<SongBook> {
    let title = title.trim();
    if title.is_empty() {
        return Err(anyhow!("Songbook title is required."));
    }
    let slug = unique_slug(conn, SlugTable::Songbooks, title)?;

    conn.execute(
        "INSERT INTO songbooks (title, slug, description, is_public, owner)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, slug, description, is_public, owner],
    )
    .context("failed to insert songbook")?;

    let id = conn.last_insert_rowid();
    info!("created songbook #{id} \"{title}\"");
    Ok(SongBook {
        id,
        title: title.to_string(),
        slug,
        description: description.to_string(),
        is_public,
        owner: owner.to_string(),
    })
}

/// Update the editable fields. We surface an explicit error when nothing was
/// updated so the UI can show a friendly message instead of silently
/// continuing.
pub fn update_songbook(
    conn: &Connection,
    id: i64,
    title: &str,
    description: &str,
    is_public: bool,
) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(anyhow!("Songbook title is required."));
    }
    let updated = conn
        .execute(
            "UPDATE songbooks SET title = ?1, description = ?2, is_public = ?3 WHERE id = ?4",
            params![title, description, is_public, id],
        )
        .context("failed to update songbook")?;

    if updated == 0 {
        Err(anyhow!("Songbook not found"))
    } else {
        Ok(())
    }
}

/// Remove a songbook. The schema cascades to `songbook_items`; the songs and
/// sections themselves are kept.
pub fn delete_songbook(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM songbooks WHERE id = ?1", params![id])
        .context("failed to delete songbook")?;

    if deleted == 0 {
        Err(anyhow!("Songbook not found"))
    } else {
        info!("deleted songbook #{id}");
        Ok(())
    }
}
