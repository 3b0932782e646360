mod config;
mod error;
mod game;
mod input;
mod level;
mod snake;
mod state;
mod term;

use std::{fs::OpenOptions, path::Path, process::exit, sync::Mutex};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{log_file_from_env, GameConfig};
use crate::error::SnakeError;

pub type TermInt = u16;
pub type Coords = (i32, i32);

fn main() {
    if let Err(err) = init_logging(log_file_from_env().as_deref()) {
        eprintln!("snakeweek: could not open log file: {}", err);
        exit(2);
    }

    let config = match GameConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("bad configuration: {}", err);
            eprintln!("snakeweek: {}", err);
            exit(2);
        }
    };

    info!(levels = config.levels.len(), "starting snakeweek");

    // The game loop restores the terminal before handing back any error
    if let Err(err) = game::SnakeGame::new(config).and_then(|mut game| game.run()) {
        error!("game aborted: {}", err);
        eprintln!("snakeweek: {}", err);
        exit(1);
    }

    info!("clean exit");
}

fn init_logging(log_file: Option<&Path>) -> Result<(), SnakeError> {
    // The terminal is in raw mode while playing, so logs only ever go to a file
    let path = match log_file {
        Some(path) => path,
        None => return Ok(()),
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}
