use crate::Coords;
use Heading::*;

pub const INITIAL_HEAD: Coords = (6, 3);
pub const INITIAL_SNAKE_LENGTH: i32 = 3;

pub const TAIL_CHAR: char = '▒';
pub const DEAD_SNAKE_CHAR: char = 'X';

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    pub fn opposite(self) -> Heading {
        match self {
            North => South,
            East => West,
            South => North,
            West => East,
        }
    }

    pub fn delta(self) -> Coords {
        match self {
            North => (0, -1),
            East => (1, 0),
            South => (0, 1),
            West => (-1, 0),
        }
    }

    pub fn head_char(self) -> char {
        match self {
            North => '^',
            East => '>',
            South => 'v',
            West => '<',
        }
    }
}

/// One occupied cell. `from` is the heading the snake had when it entered
/// the cell and `to` the heading it left with; both are only drawing hints.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub x: i32,
    pub y: i32,
    pub from: Heading,
    pub to: Heading,
}

impl Segment {
    pub fn new(x: i32, y: i32, from: Heading, to: Heading) -> Self {
        Segment { x, y, from, to }
    }

    pub fn pos(&self) -> Coords {
        (self.x, self.y)
    }

    /// Box-drawing glyph joining the side the segment was entered from with
    /// the side it was left through.
    pub fn body_char(&self) -> char {
        let entry = self.from.opposite();
        match (entry, self.to) {
            (West, East) | (East, West) => '═',
            (North, South) | (South, North) => '║',
            (West, North) | (North, West) => '╝',
            (West, South) | (South, West) => '╗',
            (East, North) | (North, East) => '╚',
            (East, South) | (South, East) => '╔',
            // entry == exit only when two turns fold the head back onto its neck
            _ => '█',
        }
    }
}

/// Head first, trailing westwards from `INITIAL_HEAD`, all heading east.
pub fn initial_body() -> Vec<Segment> {
    let (hx, hy) = INITIAL_HEAD;
    (0..INITIAL_SNAKE_LENGTH)
        .map(|i| Segment::new(hx - i, hy, East, East))
        .collect()
}

pub fn wrap(pos: Coords, width: i32, height: i32) -> Coords {
    let wrap_axis = |v: i32, max: i32| {
        if v < 0 {
            max - 1
        } else if v >= max {
            0
        } else {
            v
        }
    };
    (wrap_axis(pos.0, width), wrap_axis(pos.1, height))
}

/// Moves the snake one cell by relinking: a new head is pushed in front,
/// the old head records the turn made on it and the tail is dropped.
pub fn step(body: &[Segment], dir: Heading, width: i32, height: i32) -> Vec<Segment> {
    let old_head = match body.first() {
        Some(head) => *head,
        None => return Vec::new(),
    };

    let (dx, dy) = dir.delta();
    let (x, y) = wrap((old_head.x + dx, old_head.y + dy), width, height);
    let new_head = Segment::new(x, y, old_head.to, dir);
    let bent_head = Segment::new(old_head.x, old_head.y, old_head.to, dir);

    let mut moved = Vec::with_capacity(body.len());
    moved.push(new_head);
    moved.push(bent_head);
    moved.extend_from_slice(&body[1..]);
    moved.pop();
    moved
}

/// Duplicates the tail; the copy stays behind when the snake next moves.
pub fn grow(body: &mut Vec<Segment>) {
    if let Some(tail) = body.last().copied() {
        body.push(tail);
    }
}
