use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Section, SectionName};
use crate::registry::ItemKind;

/// Store a section heading. The name was already checked when the
/// [`SectionName`] was built.
pub fn create_section(conn: &Connection, name: &SectionName) -> Result<Section> {
    conn.execute(
        "INSERT INTO sections (name) VALUES (?1)",
        params![name.as_str()],
    )
    .context("failed to insert section")?;

    Ok(Section {
        id: conn.last_insert_rowid(),
        name: name.clone(),
    })
}

pub fn fetch_section(conn: &Connection, id: i64) -> Result<Section> {
    let name: String = conn
        .query_row(
            "SELECT name FROM sections WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .context("failed to load section")?
        .ok_or_else(|| anyhow!("Section not found"))?;

    Ok(Section {
        id,
        name: SectionName::parse(&name)?,
    })
}

pub fn rename_section(conn: &Connection, id: i64, name: &str) -> Result<Section> {
    let name = SectionName::parse(name)?;
    let updated = conn
        .execute(
            "UPDATE sections SET name = ?1 WHERE id = ?2",
            params![name.as_str(), id],
        )
        .context("failed to rename section")?;

    if updated == 0 {
        Err(anyhow!("Section not found"))
    } else {
        Ok(Section { id, name })
    }
}

/// Delete a section and every songbook entry pointing at it.
pub fn delete_section(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM songbook_items WHERE item_type = ?1 AND item_id = ?2",
        params![ItemKind::Section.tag(), id],
    )
    .context("failed to remove section from songbooks")?;

    let deleted = conn
        .execute("DELETE FROM sections WHERE id = ?1", params![id])
        .context("failed to delete section")?;

    if deleted == 0 {
        Err(anyhow!("Section not found"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{add_item, create_songbook, fetch_slots, open_in_memory};
    use crate::models::ItemRef;

    #[test]
    fn rename_checks_markup() {
        let conn = open_in_memory().unwrap();
        let section = create_section(&conn, &SectionName::parse("Intro").unwrap()).unwrap();

        assert!(rename_section(&conn, section.id, "Outro ~").is_err());
        let renamed = rename_section(&conn, section.id, " Outro ").unwrap();
        assert_eq!(renamed.name.as_str(), "Outro");
        assert_eq!(fetch_section(&conn, section.id).unwrap(), renamed);
        assert!(rename_section(&conn, 99, "Outro").is_err());
    }

    #[test]
    fn delete_removes_its_slots() {
        let conn = open_in_memory().unwrap();
        let book = create_songbook(&conn, "Camp", "", false, "alice").unwrap();
        let section = create_section(&conn, &SectionName::parse("Intro").unwrap()).unwrap();
        add_item(&conn, book.id, ItemRef::section(section.id), None).unwrap();

        delete_section(&conn, section.id).unwrap();
        assert!(fetch_slots(&conn, book.id).unwrap().is_empty());
        assert!(fetch_section(&conn, section.id).is_err());
        assert!(delete_section(&conn, section.id).is_err());
    }
}
