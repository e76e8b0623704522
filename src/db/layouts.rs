use anyhow::{anyhow, Context, Result};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::geometry::Papersize;
use crate::layout::{BookOptions, BookType, Layout, OtherOptions};

const PAPERSIZE_COLUMNS: &str =
    "p.id, p.name, p.width, p.height, p.margin_top, p.margin_right, p.margin_bottom, \
     p.margin_left, p.binding_offset";

/// Starting set of papersizes, all with the default margins.
fn default_papersizes() -> Vec<Papersize> {
    vec![
        Papersize::new("A4", 210, 297),
        Papersize::new("A5", 148, 210),
        Papersize::new("Letter", 216, 279),
    ]
}

/// Read the papersize columns starting at `offset` in `row`.
fn papersize_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Papersize> {
    Ok(Papersize {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        width: row.get(offset + 2)?,
        height: row.get(offset + 3)?,
        top: row.get(offset + 4)?,
        right: row.get(offset + 5)?,
        bottom: row.get(offset + 6)?,
        left: row.get(offset + 7)?,
        bindingoffset: row.get(offset + 8)?,
    })
}

/// Insert the default papersizes when the table is empty.
pub(crate) fn seed_papersizes(conn: &Connection) -> Result<()> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM papersizes", [], |row| row.get(0))
        .context("failed to count papersizes")?;
    if existing > 0 {
        return Ok(());
    }

    for papersize in default_papersizes() {
        create_papersize(conn, &papersize)?;
    }
    Ok(())
}

pub fn fetch_papersizes(conn: &Connection) -> Result<Vec<Papersize>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {PAPERSIZE_COLUMNS} FROM papersizes p ORDER BY p.id"))
        .context("failed to prepare papersize query")?;

    let papersizes = stmt
        .query_map([], |row| papersize_from_row(row, 0))
        .context("failed to load papersizes")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect papersizes")?;

    Ok(papersizes)
}

pub fn fetch_papersize(conn: &Connection, id: i64) -> Result<Papersize> {
    conn.query_row(
        &format!("SELECT {PAPERSIZE_COLUMNS} FROM papersizes p WHERE p.id = ?1"),
        params![id],
        |row| papersize_from_row(row, 0),
    )
    .optional()
    .context("failed to load papersize")?
    .ok_or_else(|| anyhow!("Papersize not found"))
}

pub fn create_papersize(conn: &Connection, papersize: &Papersize) -> Result<Papersize> {
    conn.execute(
        "INSERT INTO papersizes
             (name, width, height, margin_top, margin_right, margin_bottom, margin_left,
              binding_offset)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            papersize.name,
            papersize.width,
            papersize.height,
            papersize.top,
            papersize.right,
            papersize.bottom,
            papersize.left,
            papersize.bindingoffset,
        ],
    )
    .context("failed to insert papersize")?;

    Ok(Papersize {
        id: conn.last_insert_rowid(),
        ..papersize.clone()
    })
}

/// Layout row with its JSON option columns still unparsed.
struct RawLayout {
    id: i64,
    owner: String,
    booktype: String,
    bookoptions: String,
    other_options: String,
    template: String,
    papersize: Papersize,
}

impl RawLayout {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            booktype: row.get(2)?,
            bookoptions: row.get(3)?,
            other_options: row.get(4)?,
            template: row.get(5)?,
            papersize: papersize_from_row(row, 6)?,
        })
    }

    fn into_layout(self) -> Result<Layout> {
        let booktype = BookType::parse(&self.booktype)
            .ok_or_else(|| anyhow!("unknown book type \"{}\"", self.booktype))?;
        let bookoptions: BookOptions = serde_json::from_str(&self.bookoptions)
            .with_context(|| format!("invalid book options on layout #{}", self.id))?;
        let other_options: OtherOptions = serde_json::from_str(&self.other_options)
            .with_context(|| format!("invalid options on layout #{}", self.id))?;

        Ok(Layout {
            id: self.id,
            owner: self.owner,
            booktype,
            papersize: self.papersize,
            bookoptions,
            other_options,
            template: self.template,
        })
    }
}

fn layout_query(filter: &str) -> String {
    format!(
        "SELECT l.id, l.owner, l.booktype, l.bookoptions, l.other_options, l.template, \
         {PAPERSIZE_COLUMNS}
         FROM layouts l
         INNER JOIN papersizes p ON p.id = l.papersize_id
         {filter}
         ORDER BY l.owner, l.id"
    )
}

/// Layouts of one owner, or every layout when `owner` is `None`.
pub fn fetch_layouts(conn: &Connection, owner: Option<&str>) -> Result<Vec<Layout>> {
    let raw = match owner {
        Some(owner) => {
            let mut stmt = conn
                .prepare(&layout_query("WHERE l.owner = ?1"))
                .context("failed to prepare layout query")?;
            let rows = stmt
                .query_map(params![owner], RawLayout::from_row)
                .context("failed to load layouts")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to collect layouts")?;
            rows
        }
        None => {
            let mut stmt = conn
                .prepare(&layout_query(""))
                .context("failed to prepare layout query")?;
            let rows = stmt
                .query_map([], RawLayout::from_row)
                .context("failed to load layouts")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to collect layouts")?;
            rows
        }
    };

    raw.into_iter().map(RawLayout::into_layout).collect()
}

pub fn fetch_layout(conn: &Connection, id: i64) -> Result<Layout> {
    conn.query_row(
        &layout_query("WHERE l.id = ?1"),
        params![id],
        RawLayout::from_row,
    )
    .optional()
    .context("failed to load layout")?
    .ok_or_else(|| anyhow!("Layout not found"))?
    .into_layout()
}

fn encode_options(layout: &Layout) -> Result<(String, String)> {
    let bookoptions =
        serde_json::to_string(&layout.bookoptions).context("failed to encode book options")?;
    let other_options =
        serde_json::to_string(&layout.other_options).context("failed to encode layout options")?;
    Ok((bookoptions, other_options))
}

/// Store a layout. Its papersize must already be stored.
pub fn create_layout(conn: &Connection, layout: &Layout) -> Result<Layout> {
    let (bookoptions, other_options) = encode_options(layout)?;
    conn.execute(
        "INSERT INTO layouts (owner, booktype, papersize_id, bookoptions, other_options, template)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            layout.owner,
            layout.booktype.as_str(),
            layout.papersize.id,
            bookoptions,
            other_options,
            layout.template,
        ],
    )
    .context("failed to insert layout")?;

    let id = conn.last_insert_rowid();
    info!("created layout #{id} for {}", layout.owner);
    Ok(Layout {
        id,
        ..layout.clone()
    })
}

pub fn update_layout(conn: &Connection, layout: &Layout) -> Result<()> {
    let (bookoptions, other_options) = encode_options(layout)?;
    let updated = conn
        .execute(
            "UPDATE layouts
             SET booktype = ?1, papersize_id = ?2, bookoptions = ?3, other_options = ?4,
                 template = ?5
             WHERE id = ?6",
            params![
                layout.booktype.as_str(),
                layout.papersize.id,
                bookoptions,
                other_options,
                layout.template,
                layout.id,
            ],
        )
        .context("failed to update layout")?;

    if updated == 0 {
        Err(anyhow!("Layout not found"))
    } else {
        Ok(())
    }
}

pub fn delete_layout(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM layouts WHERE id = ?1", params![id])
        .context("failed to delete layout")?;

    if deleted == 0 {
        Err(anyhow!("Layout not found"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::SongbookError;
    use crate::layout::Orientation;

    #[test]
    fn schema_seeds_default_papersizes_once() {
        let conn = open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();

        let names: Vec<String> = fetch_papersizes(&conn)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["A4", "A5", "Letter"]);
    }

    #[test]
    fn layout_round_trips_options() {
        let conn = open_in_memory().unwrap();
        let a5 = fetch_papersizes(&conn).unwrap().remove(1);

        let mut layout = Layout::new("alice", a5, Orientation::Landscape);
        layout.booktype = BookType::Lyric;
        layout.bookoptions.onesongperpage = true;
        let stored = create_layout(&conn, &layout).unwrap();

        let loaded = fetch_layout(&conn, stored.id).unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.name().unwrap(), "A5 Landscape");
        assert_eq!(loaded.booktype_name(), "Lyrics only");
    }

    #[test]
    fn stored_layout_without_orientation_fails_on_use() {
        let conn = open_in_memory().unwrap();
        let a4 = fetch_papersize(&conn, 1).unwrap();
        conn.execute(
            "INSERT INTO layouts (owner, papersize_id) VALUES ('bob', ?1)",
            params![a4.id],
        )
        .unwrap();

        let layout = fetch_layouts(&conn, Some("bob")).unwrap().remove(0);
        assert_eq!(
            layout.description().unwrap_err(),
            SongbookError::MissingOrientation {
                layout_id: layout.id
            }
        );
    }

    #[test]
    fn layouts_are_filtered_by_owner() {
        let conn = open_in_memory().unwrap();
        let a4 = fetch_papersize(&conn, 1).unwrap();
        create_layout(&conn, &Layout::new("alice", a4.clone(), Orientation::Portrait)).unwrap();
        create_layout(&conn, &Layout::new("bob", a4, Orientation::Portrait)).unwrap();

        assert_eq!(fetch_layouts(&conn, Some("alice")).unwrap().len(), 1);
        assert_eq!(fetch_layouts(&conn, None).unwrap().len(), 2);

        let id = fetch_layouts(&conn, Some("bob")).unwrap()[0].id;
        delete_layout(&conn, id).unwrap();
        assert!(fetch_layout(&conn, id).is_err());
    }
}
