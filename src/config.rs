//! User configuration, read from `~/.songbook-manager/config.toml` when the
//! file exists. Every field is optional; missing ones fall back to locations
//! under the application data directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".songbook-manager";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "songbooks.sqlite";
const LOG_FILE_NAME: &str = "songbook-manager.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Root of the song source library.
    pub library_dir: PathBuf,
    /// Where rendering jobs are written.
    pub export_dir: PathBuf,
    /// Display name recorded as owner of new songbooks and layouts.
    pub owner: String,
    pub log_level: String,
}

/// On-disk shape of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    library_dir: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    owner: Option<String>,
    log_level: Option<String>,
}

impl Config {
    /// Load the configuration from the user's home directory.
    pub fn load() -> Result<Self> {
        let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
        let default_data_dir = base_dirs.home_dir().join(DATA_DIR_NAME);
        let path = default_data_dir.join(CONFIG_FILE_NAME);

        if path.is_file() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml(&contents, &default_data_dir)
                .with_context(|| format!("invalid configuration in {}", path.display()))
        } else {
            Ok(Self::with_data_dir(default_data_dir))
        }
    }

    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            library_dir: data_dir.join("library"),
            export_dir: data_dir.join("exports"),
            data_dir,
            owner: default_owner(),
            log_level: "info".to_string(),
        }
    }

    /// Parse a configuration file, filling gaps from the defaults rooted at
    /// `default_data_dir`.
    pub fn from_toml(contents: &str, default_data_dir: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).context("failed to parse configuration")?;
        let data_dir = file.data_dir.unwrap_or_else(|| default_data_dir.into());
        let defaults = Self::with_data_dir(data_dir);

        Ok(Self {
            library_dir: file.library_dir.unwrap_or(defaults.library_dir),
            export_dir: file.export_dir.unwrap_or(defaults.export_dir),
            owner: file.owner.unwrap_or(defaults.owner),
            log_level: file.log_level.unwrap_or(defaults.log_level),
            data_dir: defaults.data_dir,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }
}

fn default_owner() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "songbook".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("", Path::new("/data")).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.library_dir, PathBuf::from("/data/library"));
        assert_eq!(config.export_dir, PathBuf::from("/data/exports"));
        assert_eq!(config.database_path(), PathBuf::from("/data/songbooks.sqlite"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn explicit_values_win() {
        let config = Config::from_toml(
            "data_dir = \"/srv/books\"\nlibrary_dir = \"/srv/songs\"\nowner = \"choir\"\n",
            Path::new("/data"),
        )
        .unwrap();
        assert_eq!(config.library_dir, PathBuf::from("/srv/songs"));
        assert_eq!(config.export_dir, PathBuf::from("/srv/books/exports"));
        assert_eq!(config.owner, "choir");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("colour = \"red\"", Path::new("/data")).is_err());
    }
}
