use std::{collections::HashSet, fs, path::Path};

use tracing::{debug, info};

use crate::error::SnakeError;
use crate::snake::{INITIAL_HEAD, INITIAL_SNAKE_LENGTH};
use crate::Coords;

const WALL_CELL: char = '#';
const FLOOR_CELLS: &[char] = &['.', ' '];

const MIN_WIDTH: i32 = INITIAL_HEAD.0 + 1;
const MIN_HEIGHT: i32 = INITIAL_HEAD.1 + 1;

const OPEN_FIELD: &str = "\
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................
..............................";

const WALLED: &str = "\
##############################
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
##############################";

const CROSSROADS: &str = "\
..............#...............
..............#...............
..............#...............
..............................
..............................
..............#...............
..............#...............
..............#...............
####.######.......######.#####
..............#...............
..............#...............
..............#...............
..............................
..............................
..............#...............
..............#...............
..............#...............
..............#...............";

const PILLARS: &str = "\
..............................
..............................
..............................
..............................
.....##.....##.....##.....##..
.....##.....##.....##.....##..
..............................
..............................
..............................
..............................
..##.....##.....##.....##.....
..##.....##.....##.....##.....
..............................
..............................
..............................
.....##.....##.....##.....##..
.....##.....##.....##.....##..
..............................";

/// Static board description: a wrapping grid with obstacle cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub walls: HashSet<Coords>,
}

impl Level {
    /// Parses an ASCII map: `#` is a wall, `.` or space is floor. Trailing
    /// blank lines are ignored, every other row must be as wide as the first.
    pub fn parse(name: &str, map: &str) -> Result<Self, SnakeError> {
        let rows: Vec<&str> = map
            .trim_end_matches(|c: char| c == '\n' || c == '\r')
            .lines()
            .map(|row| row.trim_end_matches('\r'))
            .collect();

        let width = match rows.first() {
            Some(row) if !row.is_empty() => row.chars().count(),
            _ => return Err(SnakeError::EmptyLevel),
        };

        let mut walls = HashSet::new();
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(SnakeError::RaggedLevel { line: y + 1 });
            }

            for (x, cell) in row.chars().enumerate() {
                if cell == WALL_CELL {
                    walls.insert((x as i32, y as i32));
                } else if !FLOOR_CELLS.contains(&cell) {
                    return Err(SnakeError::InvalidLevelCell { line: y + 1, column: x + 1, cell });
                }
            }
        }

        Level::new(name, width as i32, rows.len() as i32, walls)
    }

    pub fn new(name: &str, width: i32, height: i32, walls: HashSet<Coords>) -> Result<Self, SnakeError> {
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            return Err(SnakeError::LevelTooSmall { width, height, min_width: MIN_WIDTH, min_height: MIN_HEIGHT });
        }

        let (hx, hy) = INITIAL_HEAD;
        if let Some(x) = (hx - INITIAL_SNAKE_LENGTH + 1..=hx).find(|x| walls.contains(&(*x, hy))) {
            return Err(SnakeError::StartBlocked { x, y: hy });
        }

        Ok(Level { name: name.to_string(), width, height, walls })
    }

    pub fn is_wall(&self, pos: Coords) -> bool {
        self.walls.contains(&pos)
    }

    pub fn cells(&self) -> impl Iterator<Item = Coords> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| (x, y)))
    }
}

pub fn builtin_levels() -> Result<Vec<Level>, SnakeError> {
    [("Open field", OPEN_FIELD), ("Walled garden", WALLED), ("Crossroads", CROSSROADS), ("Pillars", PILLARS)]
        .iter()
        .map(|(name, map)| Level::parse(name, map))
        .collect()
}

/// Loads every `*.txt` map in `dir`, sorted by file name. The file stem
/// becomes the level name.
pub fn load_level_dir(dir: &Path) -> Result<Vec<Level>, SnakeError> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "txt"))
        .collect();
    paths.sort();

    let mut levels = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let map = fs::read_to_string(&path)?;
        let level = Level::parse(&name, &map)?;
        debug!(name = %level.name, width = level.width, height = level.height, walls = level.walls.len(), "loaded level");
        levels.push(level);
    }

    info!(count = levels.len(), dir = %dir.display(), "loaded level directory");
    Ok(levels)
}
