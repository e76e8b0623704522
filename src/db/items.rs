//! The ordered item collection of a songbook.
//!
//! Ranks are plain ordering keys. Adding without a rank appends after the
//! current item count, deleting leaves a hole, and nothing renumbers behind
//! the caller's back: [`fill_holes`] is the one operation that restores the
//! dense `1..=N` sequence. Equal ranks are allowed and are ordered by slot id,
//! i.e. insertion order.
//!
//! Appending reads the item count and then inserts; two writers appending to
//! the same songbook at once can end up with the same rank. Callers that
//! share a songbook across connections must serialize those calls.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rusqlite::{ffi, params, Connection, Error as SqlError, OptionalExtension};

use crate::db::sections::create_section;
use crate::db::songs::fetch_song;
use crate::error::SongbookError;
use crate::models::{ItemRef, ItemSlot, Section, SectionName};
use crate::registry::ItemKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Slot as stored, before its kind tag is checked against the registry.
struct RawSlot {
    id: i64,
    songbook_id: i64,
    item_type: String,
    item_id: i64,
    rank: i64,
}

impl RawSlot {
    fn into_slot(self) -> Result<ItemSlot, SongbookError> {
        Ok(ItemSlot {
            id: self.id,
            songbook_id: self.songbook_id,
            item: ItemRef {
                kind: ItemKind::from_tag(&self.item_type)?,
                id: self.item_id,
            },
            rank: self.rank,
        })
    }
}

/// All slots of a songbook in rank order, ties broken by slot id.
pub fn fetch_slots(conn: &Connection, songbook_id: i64) -> Result<Vec<ItemSlot>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, songbook_id, item_type, item_id, rank
             FROM songbook_items
             WHERE songbook_id = ?1
             ORDER BY rank, id",
        )
        .context("failed to prepare songbook items query")?;

    let raw = stmt
        .query_map(params![songbook_id], |row| {
            Ok(RawSlot {
                id: row.get(0)?,
                songbook_id: row.get(1)?,
                item_type: row.get(2)?,
                item_id: row.get(3)?,
                rank: row.get(4)?,
            })
        })
        .context("failed to iterate songbook items")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect songbook items")?;

    let slots = raw
        .into_iter()
        .map(RawSlot::into_slot)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

fn fetch_slot(conn: &Connection, slot_id: i64) -> Result<ItemSlot> {
    let raw = conn
        .query_row(
            "SELECT id, songbook_id, item_type, item_id, rank
             FROM songbook_items WHERE id = ?1",
            params![slot_id],
            |row| {
                Ok(RawSlot {
                    id: row.get(0)?,
                    songbook_id: row.get(1)?,
                    item_type: row.get(2)?,
                    item_id: row.get(3)?,
                    rank: row.get(4)?,
                })
            },
        )
        .optional()
        .context("failed to load songbook item")?
        .ok_or_else(|| anyhow!("Item not found in songbook"))?;
    Ok(raw.into_slot()?)
}

/// Number of items in the songbook, any kind.
pub fn count_items(conn: &Connection, songbook_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM songbook_items WHERE songbook_id = ?1",
        params![songbook_id],
        |row| row.get(0),
    )
    .context("failed to count songbook items")
}

pub fn count_by_kind(conn: &Connection, songbook_id: i64, kind: ItemKind) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM songbook_items WHERE songbook_id = ?1 AND item_type = ?2",
        params![songbook_id, kind.tag()],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to count {} items", kind.tag()))
}

pub fn count_songs(conn: &Connection, songbook_id: i64) -> Result<i64> {
    count_by_kind(conn, songbook_id, ItemKind::Song)
}

pub fn count_sections(conn: &Connection, songbook_id: i64) -> Result<i64> {
    count_by_kind(conn, songbook_id, ItemKind::Section)
}

/// Number of distinct artists among the songs of a songbook. Songs without an
/// artist together count as one more artist.
pub fn count_distinct_artists(conn: &Connection, songbook_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM (
             SELECT DISTINCT s.artist_id
             FROM songbook_items si
             INNER JOIN songs s ON s.id = si.item_id
             WHERE si.songbook_id = ?1 AND si.item_type = ?2
         )",
        params![songbook_id, ItemKind::Song.tag()],
        |row| row.get(0),
    )
    .context("failed to count songbook artists")
}

/// Put an item into a songbook. Without a rank (or with rank 0) the item is
/// appended at `count_items + 1`. An explicit rank is used as given, even if
/// another item already holds it.
pub fn add_item(
    conn: &Connection,
    songbook_id: i64,
    item: ItemRef,
    rank: Option<i64>,
) -> Result<ItemSlot> {
    let rank = match rank {
        Some(rank) if rank < 0 => return Err(SongbookError::InvalidRank(rank).into()),
        Some(rank) if rank > 0 => rank,
        _ => count_items(conn, songbook_id)? + 1,
    };

    conn.execute(
        "INSERT INTO songbook_items (songbook_id, item_type, item_id, rank)
         VALUES (?1, ?2, ?3, ?4)",
        params![songbook_id, item.kind.tag(), item.id, rank],
    )
    .map_err(|err| map_duplicate_item(err, item.kind))
    .context("failed to add item to songbook")?;

    let id = conn.last_insert_rowid();
    info!(
        "added {} #{} to songbook #{songbook_id} at rank {rank}",
        item.kind.tag(),
        item.id
    );
    Ok(ItemSlot {
        id,
        songbook_id,
        item,
        rank,
    })
}

/// Add an existing song, checking first that it exists.
pub fn add_song(
    conn: &Connection,
    songbook_id: i64,
    song_id: i64,
    rank: Option<i64>,
) -> Result<ItemSlot> {
    let song = fetch_song(conn, song_id)?;
    add_item(conn, songbook_id, ItemRef::song(song.id), rank)
}

/// Create a section heading and add it to the songbook. The name is checked
/// before anything is written; section and slot are stored together or not
/// at all.
pub fn add_section(
    conn: &Connection,
    songbook_id: i64,
    name: &str,
    rank: Option<i64>,
) -> Result<(Section, ItemSlot)> {
    let name = SectionName::parse(name)?;

    let tx = conn
        .unchecked_transaction()
        .context("failed to start transaction")?;
    let section = create_section(&tx, &name)?;
    let slot = add_item(&tx, songbook_id, ItemRef::section(section.id), rank)?;
    tx.commit().context("failed to commit new section")?;

    Ok((section, slot))
}

/// Take an item out of a songbook. The remaining ranks are not compacted.
pub fn remove_item(conn: &Connection, songbook_id: i64, item: ItemRef) -> Result<()> {
    let deleted = conn
        .execute(
            "DELETE FROM songbook_items
             WHERE songbook_id = ?1 AND item_type = ?2 AND item_id = ?3",
            params![songbook_id, item.kind.tag(), item.id],
        )
        .context("failed to remove item from songbook")?;

    if deleted == 0 {
        Err(anyhow!("{} not in this songbook", item.kind))
    } else {
        info!(
            "removed {} #{} from songbook #{songbook_id}",
            item.kind.tag(),
            item.id
        );
        Ok(())
    }
}

/// Set the rank of one slot verbatim.
pub fn set_item_rank(conn: &Connection, slot_id: i64, rank: i64) -> Result<()> {
    if rank <= 0 {
        return Err(SongbookError::InvalidRank(rank).into());
    }
    let updated = conn
        .execute(
            "UPDATE songbook_items SET rank = ?1 WHERE id = ?2",
            params![rank, slot_id],
        )
        .context("failed to update item rank")?;

    if updated == 0 {
        Err(anyhow!("Item not found in songbook"))
    } else {
        Ok(())
    }
}

/// Swap a slot's rank with its neighbour in rank order. Returns `false` when
/// the slot is already first (or last) and nothing moved.
pub fn move_item(conn: &Connection, slot_id: i64, direction: MoveDirection) -> Result<bool> {
    let slot = fetch_slot(conn, slot_id)?;
    let slots = fetch_slots(conn, slot.songbook_id)?;
    let position = slots
        .iter()
        .position(|candidate| candidate.id == slot.id)
        .ok_or_else(|| anyhow!("Item not found in songbook"))?;

    let neighbour = match direction {
        MoveDirection::Up if position > 0 => &slots[position - 1],
        MoveDirection::Down if position + 1 < slots.len() => &slots[position + 1],
        _ => return Ok(false),
    };

    if neighbour.rank == slot.rank {
        return Err(anyhow!(
            "Several items share rank {}; fill the holes before reordering.",
            slot.rank
        ));
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to start transaction")?;
    set_item_rank(&tx, slot.id, neighbour.rank)?;
    set_item_rank(&tx, neighbour.id, slot.rank)?;
    tx.commit().context("failed to commit reordering")?;

    debug!(
        "swapped ranks {} and {} in songbook #{}",
        slot.rank, neighbour.rank, slot.songbook_id
    );
    Ok(true)
}

/// Renumber every slot of the songbook to `1..=N` in the current rank order.
/// Returns how many slots changed rank; zero when the ranks were already
/// dense.
pub fn fill_holes(conn: &Connection, songbook_id: i64) -> Result<usize> {
    let slots = fetch_slots(conn, songbook_id)?;

    let tx = conn
        .unchecked_transaction()
        .context("failed to start transaction")?;
    let mut changed = 0usize;
    for (index, slot) in slots.iter().enumerate() {
        let rank = index as i64 + 1;
        if slot.rank != rank {
            set_item_rank(&tx, slot.id, rank)?;
            changed += 1;
        }
    }
    tx.commit().context("failed to commit renumbered ranks")?;

    if changed > 0 {
        info!("filled holes in songbook #{songbook_id}: {changed} item(s) renumbered");
    }
    Ok(changed)
}

/// The only UNIQUE constraint on the table is one-item-per-songbook; turn its
/// violation into a readable message. Other failures (a missing songbook
/// trips the foreign key) pass through.
fn map_duplicate_item(err: SqlError, kind: ItemKind) -> anyhow::Error {
    match &err {
        SqlError::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            anyhow!("{kind} is already in this songbook.")
        }
        _ => err.into(),
    }
}
