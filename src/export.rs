//! Rendering jobs: everything the external typesetting engine needs to build
//! one songbook with one layout, written as a single JSON file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::db::{fetch_layout, fetch_songbook};
use crate::serializer::{describe_songbook, songbook_hash, SongbookDescription};

#[derive(Debug, Clone, Serialize)]
pub struct RenderJob {
    pub songbook: SongbookDescription,
    pub layout: Map<String, Value>,
}

/// Describe a songbook together with a layout. Fails as a whole if either
/// description cannot be produced.
pub fn build_render_job(conn: &Connection, songbook_id: i64, layout_id: i64) -> Result<RenderJob> {
    let songbook = describe_songbook(conn, songbook_id)?;
    let layout = fetch_layout(conn, layout_id)?;
    let layout = layout
        .description()
        .with_context(|| format!("layout #{layout_id} cannot be rendered"))?;
    Ok(RenderJob { songbook, layout })
}

/// Write the rendering job to `<export_dir>/<slug>-<hash>.json`, where the
/// hash prefix changes whenever the songbook content changes.
pub fn export_songbook(
    conn: &Connection,
    config: &Config,
    songbook_id: i64,
    layout_id: i64,
) -> Result<PathBuf> {
    let book = fetch_songbook(conn, songbook_id)?;
    let job = build_render_job(conn, songbook_id, layout_id)?;
    let hash = songbook_hash(&job.songbook)?;

    fs::create_dir_all(&config.export_dir).with_context(|| {
        format!(
            "failed to create export directory {}",
            config.export_dir.display()
        )
    })?;

    let path = config
        .export_dir
        .join(format!("{}-{}.json", book.slug, &hash[..8]));
    let json = serde_json::to_string_pretty(&job).context("failed to serialize render job")?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;

    info!("exported songbook #{songbook_id} to {} ({hash})", path.display());
    Ok(path)
}
