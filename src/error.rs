use thiserror::Error;

use crate::TermInt;

#[derive(Debug, Error)]
pub enum SnakeError {
    #[error("terminal error: {0}")]
    Terminal(#[from] crossterm::ErrorKind),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("unknown level: {0}")]
    UnknownLevel(String),

    #[error("level has no rows")]
    EmptyLevel,

    #[error("level row {line} has a different width than the first row")]
    RaggedLevel { line: usize },

    #[error("unexpected cell {cell:?} at line {line}, column {column}")]
    InvalidLevelCell { line: usize, column: usize, cell: char },

    #[error("level is {width}x{height}, needs at least {min_width}x{min_height}")]
    LevelTooSmall { width: i32, height: i32, min_width: i32, min_height: i32 },

    #[error("starting cell ({x}, {y}) is a wall")]
    StartBlocked { x: i32, y: i32 },

    #[error("terminal is {width}x{height}, board needs {needed_width}x{needed_height}")]
    TerminalTooSmall { width: TermInt, height: TermInt, needed_width: TermInt, needed_height: TermInt },
}
