//! Song source files on disk. The database only ever stores the path
//! relative to the library root; the root itself comes from configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Subdirectory of the library that holds song sources.
const SONGS_DIR: &str = "songs";
/// Extension of song source files.
const SONG_EXTENSION: &str = "sgc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongLibrary {
    root: PathBuf,
}

impl SongLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path stored for the song with `slug`, e.g. `songs/hey-jude.sgc`.
    pub fn relative_path_for(slug: &str) -> String {
        format!("{SONGS_DIR}/{slug}.{SONG_EXTENSION}")
    }

    pub fn absolute_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write the source text of a song and return the relative path to store.
    pub fn write_song_text(&self, slug: &str, text: &str) -> Result<String> {
        let relative = Self::relative_path_for(slug);
        let path = self.absolute_path(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, text)
            .with_context(|| format!("failed to write song source {}", path.display()))?;
        Ok(relative)
    }

    pub fn read_song_text(&self, relative: &str) -> Result<String> {
        let path = self.absolute_path(relative);
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read song source {}", path.display()))
    }

    /// Remove a song source. A file that is already gone is not an error.
    pub fn remove_song_text(&self, relative: &str) -> Result<()> {
        let path = self.absolute_path(relative);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove song source {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_under_songs_directory() {
        let dir = tempfile::tempdir().unwrap();
        let library = SongLibrary::new(dir.path());

        let relative = library
            .write_song_text("hey-jude", "\\beginsong{Hey Jude}\n")
            .unwrap();
        assert_eq!(relative, "songs/hey-jude.sgc");
        assert!(dir.path().join("songs").join("hey-jude.sgc").is_file());
        assert_eq!(
            library.read_song_text(&relative).unwrap(),
            "\\beginsong{Hey Jude}\n"
        );

        library.remove_song_text(&relative).unwrap();
        library.remove_song_text(&relative).unwrap();
        assert!(library.read_song_text(&relative).is_err());
    }
}
