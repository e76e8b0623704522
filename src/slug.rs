//! URL-friendly identifiers for songs, artists and songbooks.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// Lower-case ASCII letters and digits, every other run of characters turned
/// into a single `-`. Accented Latin letters are folded to their base letter.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars().flat_map(fold_accent) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn fold_accent(ch: char) -> impl Iterator<Item = char> {
    let folded: &[char] = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ă' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ă' => &['a'],
        'æ' | 'Æ' => &['a', 'e'],
        'ç' | 'Ç' => &['c'],
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => &['e'],
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => &['i'],
        'ñ' | 'Ñ' => &['n'],
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => &['o'],
        'œ' | 'Œ' => &['o', 'e'],
        'ș' | 'ş' | 'Ș' | 'Ş' => &['s'],
        'ț' | 'ţ' | 'Ț' | 'Ţ' => &['t'],
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => &['u'],
        'ý' | 'ÿ' | 'Ý' => &['y'],
        'ß' => &['s', 's'],
        _ => return vec![ch].into_iter(),
    };
    folded.to_vec().into_iter()
}

/// Tables whose rows carry a unique `slug` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugTable {
    Artists,
    Songs,
    Songbooks,
}

impl SlugTable {
    fn name(self) -> &'static str {
        match self {
            SlugTable::Artists => "artists",
            SlugTable::Songs => "songs",
            SlugTable::Songbooks => "songbooks",
        }
    }

    /// Fallback used when the text has no sluggable characters at all.
    fn fallback(self) -> &'static str {
        match self {
            SlugTable::Artists => "artist",
            SlugTable::Songs => "song",
            SlugTable::Songbooks => "songbook",
        }
    }
}

/// Slugify `text` and append `-2`, `-3`, … until the slug is unused in
/// `table`.
pub fn unique_slug(conn: &Connection, table: SlugTable, text: &str) -> Result<String> {
    let mut base = slugify(text);
    if base.is_empty() {
        base = table.fallback().to_string();
    }

    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE slug = ?1)", table.name());
    let mut stmt = conn
        .prepare(&sql)
        .context("failed to prepare slug lookup")?;

    let mut candidate = base.clone();
    let mut suffix = 2;
    while stmt
        .query_row(params![candidate], |row| row.get::<_, bool>(0))
        .context("failed to check slug")?
    {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }

    Ok(candidate)
}
