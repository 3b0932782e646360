use std::{env, path::PathBuf, str::FromStr};

use tracing::info;

use crate::error::SnakeError;
use crate::level::{builtin_levels, load_level_dir, Level};

/// Gameplay knobs carried by every `GameState`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rules {
    /// Uneaten food respawns once older than this
    pub food_ttl_ms: u64,
    /// Milliseconds between steps at the start of a game
    pub start_speed: u64,
    /// Floor for the step interval as food is eaten
    pub min_speed: u64,
    /// Random probes before falling back to scanning the free cells
    pub spawn_attempts: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            food_ttl_ms: 10_000,
            start_speed: 80,
            min_speed: 5,
            spawn_attempts: 64,
        }
    }
}

pub struct GameConfig {
    pub rules: Rules,
    pub levels: Vec<Level>,
    /// Index into `levels` selected when the menu first opens
    pub initial_level: usize,
}

/// `SNAKE_LOG_FILE`, read on its own so the subscriber is up before the
/// rest of the configuration logs anything.
pub fn log_file_from_env() -> Option<PathBuf> {
    log_file_from_lookup(|key| env::var(key).ok())
}

fn log_file_from_lookup<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&'static str) -> Option<String>,
{
    lookup("SNAKE_LOG_FILE")
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

impl GameConfig {
    /// Builds the config from `SNAKE_*` environment variables on top of
    /// the defaults and the built-in levels.
    pub fn from_env() -> Result<Self, SnakeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, SnakeError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Rules::default();
        let rules = Rules {
            food_ttl_ms: parse_var(&lookup, "SNAKE_FOOD_TTL_MS")?.unwrap_or(defaults.food_ttl_ms),
            start_speed: parse_var(&lookup, "SNAKE_START_SPEED")?.unwrap_or(defaults.start_speed),
            ..defaults
        };
        if rules.start_speed < rules.min_speed {
            return Err(SnakeError::InvalidConfig {
                key: "SNAKE_START_SPEED",
                value: rules.start_speed.to_string(),
            });
        }

        let mut levels = builtin_levels()?;
        if let Some(dir) = lookup("SNAKE_LEVEL_DIR") {
            levels.extend(load_level_dir(&PathBuf::from(dir))?);
        }

        let initial_level = match lookup("SNAKE_LEVEL") {
            Some(wanted) => find_level(&levels, &wanted)?,
            None => 0,
        };

        let config = GameConfig { rules, levels, initial_level };
        info!(rules = ?config.rules, initial_level, "configuration loaded");
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, SnakeError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SnakeError::InvalidConfig { key, value }),
        None => Ok(None),
    }
}

/// Accepts either a level name (case-insensitive) or its 1-based position.
fn find_level(levels: &[Level], wanted: &str) -> Result<usize, SnakeError> {
    if let Ok(n) = wanted.trim().parse::<usize>() {
        if n >= 1 && n <= levels.len() {
            return Ok(n - 1);
        }
    }

    levels
        .iter()
        .position(|level| level.name.eq_ignore_ascii_case(wanted.trim()))
        .ok_or_else(|| SnakeError::UnknownLevel(wanted.to_string()))
}
