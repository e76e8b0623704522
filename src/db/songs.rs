use anyhow::{anyhow, Context, Result};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::library::SongLibrary;
use crate::models::{Artist, Song, SongDraft};
use crate::registry::ItemKind;
use crate::slug::{unique_slug, SlugTable};

const SONG_COLUMNS: &str = "id, title, slug, language, artist_id, file_path";

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        language: row.get(3)?,
        artist_id: row.get(4)?,
        file_path: row.get(5)?,
    })
}

/// Every artist, alphabetically.
pub fn fetch_artists(conn: &Connection) -> Result<Vec<Artist>> {
    let mut stmt = conn
        .prepare("SELECT id, name, slug FROM artists ORDER BY name COLLATE NOCASE")
        .context("failed to prepare artist query")?;

    let artists = stmt
        .query_map([], |row| {
            Ok(Artist {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
            })
        })
        .context("failed to load artists")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect artists")?;

    Ok(artists)
}

pub fn create_artist(conn: &Connection, name: &str) -> Result<Artist> {
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Artist name is required."));
    }
    let slug = unique_slug(conn, SlugTable::Artists, name)?;
    conn.execute(
        "INSERT INTO artists (name, slug) VALUES (?1, ?2)",
        params![name, slug],
    )
    .context("failed to insert artist")?;

    Ok(Artist {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        slug,
    })
}

/// Reuse an artist with the same name (case-insensitive) or create one. Used
/// by the song form, where the artist is typed as free text.
pub fn find_or_create_artist(conn: &Connection, name: &str) -> Result<Artist> {
    let existing = conn
        .query_row(
            "SELECT id, name, slug FROM artists WHERE name = ?1 COLLATE NOCASE",
            params![name.trim()],
            |row| {
                Ok(Artist {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            },
        )
        .optional()
        .context("failed to look up artist")?;

    match existing {
        Some(artist) => Ok(artist),
        None => create_artist(conn, name),
    }
}

/// Fetch all songs, ordered case-insensitively so mixed-case titles group
/// together in the UI.
pub fn fetch_all_songs(conn: &Connection) -> Result<Vec<Song>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SONG_COLUMNS} FROM songs ORDER BY title COLLATE NOCASE"
        ))
        .context("failed to prepare all songs query")?;

    let songs = stmt
        .query_map([], song_from_row)
        .context("failed to iterate songs")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect songs")?;

    Ok(songs)
}

pub fn fetch_song(conn: &Connection, id: i64) -> Result<Song> {
    conn.query_row(
        &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
        params![id],
        song_from_row,
    )
    .optional()
    .context("failed to load song")?
    .ok_or_else(|| anyhow!("Song not found"))
}

/// Songs not yet in the given songbook, so the "Add Song" picker only offers
/// eligible entries.
pub fn fetch_available_songs(conn: &Connection, songbook_id: i64) -> Result<Vec<Song>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SONG_COLUMNS}
             FROM songs s
             WHERE NOT EXISTS (
                 SELECT 1 FROM songbook_items si
                 WHERE si.item_type = ?1 AND si.item_id = s.id AND si.songbook_id = ?2
             )
             ORDER BY s.title COLLATE NOCASE"
        ))
        .context("failed to prepare available songs query")?;

    let songs = stmt
        .query_map(params![ItemKind::Song.tag(), songbook_id], song_from_row)
        .context("failed to iterate available songs")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect available songs")?;

    Ok(songs)
}

/// Create a song together with its source text. The row is inserted first
/// and the file written before the insert is committed, so a failed insert
/// leaves no file behind and a failed write leaves no row.
pub fn create_song(
    conn: &Connection,
    library: &SongLibrary,
    draft: &SongDraft,
    text: &str,
) -> Result<Song> {
    let draft = draft.normalized()?;
    let slug = unique_slug(conn, SlugTable::Songs, &draft.title)?;
    let file_path = SongLibrary::relative_path_for(&slug);

    let tx = conn
        .unchecked_transaction()
        .context("failed to start transaction")?;
    tx.execute(
        "INSERT INTO songs (title, slug, language, artist_id, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![draft.title, slug, draft.language, draft.artist_id, file_path],
    )
    .context("failed to insert song")?;
    let id = tx.last_insert_rowid();

    library.write_song_text(&slug, text)?;
    if let Err(err) = tx.commit() {
        library.remove_song_text(&file_path)?;
        return Err(err).context("failed to commit song");
    }

    info!("created song #{id} at {file_path}");
    Ok(Song {
        id,
        title: draft.title,
        slug,
        language: draft.language,
        artist_id: draft.artist_id,
        file_path,
    })
}

/// Update the descriptive fields of a song. The slug and path stay put so
/// existing exports keep pointing at the same file.
pub fn update_song(conn: &Connection, id: i64, draft: &SongDraft) -> Result<()> {
    let draft = draft.normalized()?;
    let updated = conn
        .execute(
            "UPDATE songs SET title = ?1, language = ?2, artist_id = ?3 WHERE id = ?4",
            params![draft.title, draft.language, draft.artist_id, id],
        )
        .context("failed to update song")?;

    if updated == 0 {
        Err(anyhow!("Song not found"))
    } else {
        Ok(())
    }
}

/// Replace the source text of a song and store the path it was written to.
pub fn update_song_text(
    conn: &Connection,
    library: &SongLibrary,
    id: i64,
    text: &str,
) -> Result<String> {
    let song = fetch_song(conn, id)?;
    let file_path = library.write_song_text(&song.slug, text)?;
    conn.execute(
        "UPDATE songs SET file_path = ?1 WHERE id = ?2",
        params![file_path, id],
    )
    .context("failed to update song path")?;
    Ok(file_path)
}

/// Permanently delete a song, its songbook entries and its source file. Ranks
/// of the affected songbooks are left as they are.
pub fn delete_song(conn: &Connection, library: &SongLibrary, id: i64) -> Result<()> {
    let song = fetch_song(conn, id)?;

    let tx = conn
        .unchecked_transaction()
        .context("failed to start transaction")?;
    tx.execute(
        "DELETE FROM songbook_items WHERE item_type = ?1 AND item_id = ?2",
        params![ItemKind::Song.tag(), id],
    )
    .context("failed to remove song from songbooks")?;

    let deleted = tx
        .execute("DELETE FROM songs WHERE id = ?1", params![id])
        .context("failed to delete song")?;

    if deleted == 0 {
        return Err(anyhow!("Song not found"));
    }
    tx.commit().context("failed to commit song deletion")?;

    library.remove_song_text(&song.file_path)?;
    info!("deleted song #{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{add_song, create_songbook, fetch_slots, open_in_memory};

    #[test]
    fn artists_are_reused_by_name() {
        let conn = open_in_memory().unwrap();
        let first = find_or_create_artist(&conn, "Édith Piaf").unwrap();
        let again = find_or_create_artist(&conn, " Édith Piaf ").unwrap();
        assert_eq!(first, again);
        assert_eq!(first.slug, "edith-piaf");
        assert_eq!(fetch_artists(&conn).unwrap(), vec![first]);
    }

    #[test]
    fn song_text_lives_in_the_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = SongLibrary::new(dir.path());
        let conn = open_in_memory().unwrap();

        let song = create_song(&conn, &library, &SongDraft::new("La Vie en rose"), "v1").unwrap();
        assert_eq!(song.file_path, "songs/la-vie-en-rose.sgc");
        assert_eq!(library.read_song_text(&song.file_path).unwrap(), "v1");

        let path = update_song_text(&conn, &library, song.id, "v2").unwrap();
        assert_eq!(path, song.file_path);
        assert_eq!(library.read_song_text(&path).unwrap(), "v2");

        let twin = create_song(&conn, &library, &SongDraft::new("La vie en Rose"), "").unwrap();
        assert_eq!(twin.slug, "la-vie-en-rose-2");
    }

    #[test]
    fn failed_insert_leaves_no_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let library = SongLibrary::new(dir.path());
        let conn = open_in_memory().unwrap();

        let draft = SongDraft::new("Ghost").with_artist(999);
        assert!(create_song(&conn, &library, &draft, "text").is_err());

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert!(!library.absolute_path("songs/ghost.sgc").exists());
    }

    #[test]
    fn failed_delete_keeps_slots() {
        let dir = tempfile::tempdir().unwrap();
        let library = SongLibrary::new(dir.path());
        let conn = open_in_memory().unwrap();
        let book = create_songbook(&conn, "Camp", "", false, "alice").unwrap();
        let song = create_song(&conn, &library, &SongDraft::new("Kept"), "").unwrap();
        add_song(&conn, book.id, song.id, None).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER songs_locked BEFORE DELETE ON songs
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .unwrap();

        assert!(delete_song(&conn, &library, song.id).is_err());
        assert_eq!(fetch_slots(&conn, book.id).unwrap().len(), 1);
        assert!(library.absolute_path(&song.file_path).exists());
    }

    #[test]
    fn update_keeps_slug_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let library = SongLibrary::new(dir.path());
        let conn = open_in_memory().unwrap();
        let song = create_song(&conn, &library, &SongDraft::new("Alouette"), "").unwrap();

        let draft = SongDraft::new("Alouette, gentille alouette").with_language("FR");
        update_song(&conn, song.id, &draft).unwrap();
        let stored = fetch_song(&conn, song.id).unwrap();
        assert_eq!(stored.title, "Alouette, gentille alouette");
        assert_eq!(stored.language.as_deref(), Some("fr"));
        assert_eq!(stored.slug, song.slug);

        assert!(update_song(&conn, song.id, &SongDraft::new("  ")).is_err());
        assert!(update_song(&conn, 99, &SongDraft::new("Ghost")).is_err());
    }

    #[test]
    fn available_songs_exclude_members() {
        let dir = tempfile::tempdir().unwrap();
        let library = SongLibrary::new(dir.path());
        let conn = open_in_memory().unwrap();
        let book = create_songbook(&conn, "Camp", "", false, "alice").unwrap();
        let inside = create_song(&conn, &library, &SongDraft::new("Inside"), "").unwrap();
        let outside = create_song(&conn, &library, &SongDraft::new("Outside"), "").unwrap();
        add_song(&conn, book.id, inside.id, None).unwrap();

        assert_eq!(fetch_available_songs(&conn, book.id).unwrap(), vec![outside]);
    }
}
