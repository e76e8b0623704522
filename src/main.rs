//! Binary entry point: load configuration, route logging to a file (the TUI
//! owns the terminal), open the database and drive the Ratatui event loop
//! until the user exits.
use std::fs::{self, OpenOptions};

use anyhow::{Context, Result};
use env_logger::{Env, Target};
use songbook_manager::{open_database, run_app, App, Config, SongLibrary};

fn init_logging(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.data_dir).context("failed to create data directory")?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .context("failed to open log file")?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str()))
        .target(Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config)?;

    let conn = open_database(&config)?;
    let library = SongLibrary::new(&config.library_dir);

    let mut app = App::new(conn, config, library)?;
    run_app(&mut app)
}
