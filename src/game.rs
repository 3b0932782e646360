use std::{collections::HashMap, time::{Duration, Instant}};

use rand::rngs::ThreadRng;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::SnakeError;
use crate::input::{is_ctrl_c, Key, PressedKeys};
use crate::level::Level;
use crate::snake::{Heading, Segment, DEAD_SNAKE_CHAR, TAIL_CHAR};
use crate::state::GameState;
use crate::term::{TermManager, TermPos};
use crate::{Coords, TermInt};

const FRAME_MS: u64 = 16;
const GAME_OVER_GRACE_MS: u128 = 600;

const CELL_WIDTH: TermInt = 2;
const HUD_ROWS: TermInt = 2;

const WALL_CHAR: char = '#';
const FOOD_CHAR: char = 'O';
const OLD_FOOD_CHAR: char = 'o';
const HORIZONTAL_FILL: char = '═';

const TITLE: &[&str] = &[
    "S N A K E W E E K",
    "",
    "Arrow keys or WASD to move, Space or Esc to pause",
    "Enter to play, C for credits, Ctrl+C to quit",
];

const CREDITS: &[&str] = &[
    "Credits",
    "",
    "Made during snake week",
    "Terminal port on crossterm",
    "",
    "Press any key",
];

/// A running game: its state, the keys held this frame and the clock origin.
struct Session {
    state: GameState,
    pressed: PressedKeys,
    started: Instant,
}

enum Screen {
    Menu,
    Credits,
    Main(Session),
    GameOver { state: GameState, since: Instant },
}

enum Transition {
    Stay(Screen),
    Switch(Screen),
}

pub struct SnakeGame {
    config: GameConfig,
    selected: usize,
    term: TermManager,
    rng: ThreadRng,
}

impl SnakeGame {
    pub fn new(config: GameConfig) -> Result<Self, SnakeError> {
        let selected = config.initial_level;
        Ok(SnakeGame { config, selected, term: TermManager::new()?, rng: rand::thread_rng() })
    }

    /// Runs screens until Ctrl+C. The terminal is restored on every exit path.
    pub fn run(&mut self) -> Result<(), SnakeError> {
        self.term.setup()?;
        let result = self.main_loop();
        let restored = self.term.restore();
        result.and(restored)
    }

    fn main_loop(&mut self) -> Result<(), SnakeError> {
        let mut screen = Screen::Menu;
        self.on_show(&screen)?;

        loop {
            let events = self.term.read_key_events_queue(Duration::from_millis(FRAME_MS))?;
            if events.iter().any(is_ctrl_c) {
                return Ok(());
            }
            let keys: Vec<Key> = events.iter().map(Key::from_event).collect();

            screen = match self.on_render(screen, &keys)? {
                Transition::Stay(screen) => screen,
                Transition::Switch(next) => {
                    self.on_hide()?;
                    self.on_show(&next)?;
                    next
                }
            };

            self.term.flush()?;
        }
    }

    ////////////////////////////////////////////////////////////////////////

    fn on_show(&mut self, screen: &Screen) -> Result<(), SnakeError> {
        match screen {
            Screen::Menu => self.draw_menu(),
            Screen::Credits => self.draw_lines(CREDITS),
            Screen::Main(session) => self.draw_frame(&session.state),
            Screen::GameOver { state, .. } => {
                self.draw_frame(state)?;
                self.draw_board(state)?;
                let score = format!("Score: {}", state.score);
                let length = format!("Length: {}", state.snake.len());
                self.term.show_message(&[
                    "Game over!",
                    &score,
                    &length,
                    "",
                    "Press any key for the menu,",
                    "or Ctrl+C to quit.",
                ])
            }
        }
    }

    fn on_hide(&mut self) -> Result<(), SnakeError> {
        self.term.clear()
    }

    fn on_render(&mut self, screen: Screen, keys: &[Key]) -> Result<Transition, SnakeError> {
        match screen {
            Screen::Menu => self.render_menu(keys),
            Screen::Credits if !keys.is_empty() => Ok(Transition::Switch(Screen::Menu)),
            Screen::Credits => Ok(Transition::Stay(Screen::Credits)),
            Screen::Main(session) => self.render_main(session, keys),
            Screen::GameOver { since, .. }
                if !keys.is_empty() && since.elapsed().as_millis() > GAME_OVER_GRACE_MS =>
            {
                Ok(Transition::Switch(Screen::Menu))
            }
            over @ Screen::GameOver { .. } => Ok(Transition::Stay(over)),
        }
    }

    fn render_menu(&mut self, keys: &[Key]) -> Result<Transition, SnakeError> {
        let count = self.config.levels.len();

        if !keys.is_empty() && self.term.has_message() {
            self.term.hide_message()?;
        }

        for key in keys {
            match key {
                Key::Up => self.selected = (self.selected + count - 1) % count,
                Key::Down => self.selected = (self.selected + 1) % count,
                Key::Confirm | Key::Pause => {
                    let level = &self.config.levels[self.selected];
                    match board_fits(self.term.get_terminal_size(), level) {
                        Ok(()) => return Ok(Transition::Switch(Screen::Main(self.start_session()))),
                        Err(err) => {
                            warn!(level = %level.name, "{}", err);
                            self.draw_menu()?;
                            self.term.show_message(&[&err.to_string(), "", "Pick another level or enlarge the terminal"])?;
                            return Ok(Transition::Stay(Screen::Menu));
                        }
                    }
                }
                Key::Credits => return Ok(Transition::Switch(Screen::Credits)),
                _ => {}
            }
        }

        if !keys.is_empty() {
            self.draw_menu()?;
        }
        Ok(Transition::Stay(Screen::Menu))
    }

    fn render_main(&mut self, mut session: Session, keys: &[Key]) -> Result<Transition, SnakeError> {
        let mut state = session.state;

        for key in keys {
            state = state.on_key_down(*key);
            session.pressed.press(*key);
        }

        let now = session.started.elapsed().as_millis() as u64;
        state = state.advance(&session.pressed, now, &mut self.rng);

        // Presses are all the terminal reports, so every key is let go at frame end
        for key in session.pressed.release_all() {
            state = state.on_key_up(key);
        }

        if state.dead {
            info!(score = state.score, length = state.snake.len(), level = %state.level.name, "game over");
            return Ok(Transition::Switch(Screen::GameOver { state, since: Instant::now() }));
        }

        if state.paused {
            if !self.term.has_message() {
                self.term.show_message(&["Paused", "Space or Esc to resume", "or Ctrl+C to quit"])?;
            }
        } else {
            if self.term.has_message() {
                self.term.hide_message()?;
            }
            self.draw_board(&state)?;
            self.draw_hud(&state)?;
        }

        session.state = state;
        Ok(Transition::Stay(Screen::Main(session)))
    }

    fn start_session(&mut self) -> Session {
        let level = self.config.levels[self.selected].clone();
        debug!(level = %level.name, "starting session");
        Session {
            state: GameState::new_game(level, self.config.rules, 0, &mut self.rng),
            pressed: PressedKeys::new(),
            started: Instant::now(),
        }
    }

    ////////////////////////////////////////////////////////////////////////

    fn board_origin(&self, state: &GameState) -> TermPos {
        let (tw, th) = self.term.get_terminal_size();
        let board_w = state.level.width as TermInt * CELL_WIDTH;
        let board_h = state.level.height as TermInt;
        let x = tw.saturating_sub(board_w) / 2;
        let y = (HUD_ROWS + 1).max(th.saturating_sub(board_h) / 2);
        (x.max(1), y)
    }

    fn cell_pos(&self, origin: TermPos, pos: Coords) -> TermPos {
        (origin.0 + pos.0 as TermInt * CELL_WIDTH, origin.1 + pos.1 as TermInt)
    }

    fn draw_frame(&mut self, state: &GameState) -> Result<(), SnakeError> {
        let origin = self.board_origin(state);
        let size = (state.level.width as TermInt * CELL_WIDTH, state.level.height as TermInt);
        self.term.draw_borders(origin, size)?;
        self.draw_hud(state)
    }

    fn draw_board(&mut self, state: &GameState) -> Result<(), SnakeError> {
        let origin = self.board_origin(state);

        let mut snake_cells: HashMap<Coords, [char; 2]> = HashMap::new();
        // Tail first so the head wins where segments overlap after growing
        for (i, seg) in state.snake.iter().enumerate().rev() {
            snake_cells.insert(seg.pos(), segment_glyphs(i, seg, state.snake.len(), state.dead));
        }

        let food = state.food.map(|food| {
            let stale = food.age(state.current_time) > state.rules.food_ttl_ms / 2;
            (food.pos(), if stale {OLD_FOOD_CHAR} else {FOOD_CHAR})
        });

        for pos in state.level.cells() {
            let glyphs = if let Some(glyphs) = snake_cells.get(&pos) {
                *glyphs
            } else if state.level.is_wall(pos) {
                [WALL_CHAR, WALL_CHAR]
            } else {
                match food {
                    Some((food_pos, ch)) if food_pos == pos => [ch, ' '],
                    _ => [' ', ' '],
                }
            };

            let (x, y) = self.cell_pos(origin, pos);
            self.term.print_at((x, y), glyphs[0])?;
            self.term.print_at((x + 1, y), glyphs[1])?;
        }

        Ok(())
    }

    fn draw_hud(&mut self, state: &GameState) -> Result<(), SnakeError> {
        let origin = self.board_origin(state);
        let row = origin.1.saturating_sub(HUD_ROWS);
        let food_secs = state.current_time.saturating_sub(state.last_spawn) / 1000;
        let hud = format!(
            "{}   Score: {:<6} Speed: {:>2}ms   Length: {:<4} Food: {:>2}s",
            state.level.name,
            state.score,
            state.speed,
            state.snake.len(),
            food_secs
        );
        self.term.print_str_at((origin.0, row), &hud)
    }

    fn draw_menu(&mut self) -> Result<(), SnakeError> {
        let mut lines: Vec<String> = TITLE.iter().map(|line| line.to_string()).collect();
        lines.push(String::new());

        for (i, level) in self.config.levels.iter().enumerate() {
            let marker = if i == self.selected {'>'} else {' '};
            lines.push(format!("{} {:<24} {:>2}x{:<2}", marker, level.name, level.width, level.height));
        }

        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        self.draw_lines(&lines)
    }

    fn draw_lines(&mut self, lines: &[&str]) -> Result<(), SnakeError> {
        let (tw, th) = self.term.get_terminal_size();
        let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0) as TermInt;
        let left = tw.saturating_sub(width) / 2;
        let top = th.saturating_sub(lines.len() as TermInt) / 2;

        for (i, line) in lines.iter().enumerate() {
            let padded = format!("{:<width$}", line, width = width as usize);
            self.term.print_str_at((left, top + i as TermInt), &padded)?;
        }

        Ok(())
    }
}

/// Whether `level` plus its border and HUD fits a terminal of `term_size`.
fn board_fits(term_size: TermPos, level: &Level) -> Result<(), SnakeError> {
    let (width, height) = term_size;
    let needed_width = level.width as TermInt * CELL_WIDTH + 2;
    let needed_height = level.height as TermInt + HUD_ROWS + 2;

    if width < needed_width || height < needed_height {
        return Err(SnakeError::TerminalTooSmall { width, height, needed_width, needed_height });
    }
    Ok(())
}

/// The two terminal columns drawn for one segment. The second column
/// carries a horizontal stroke when the segment joins its east neighbour.
fn segment_glyphs(index: usize, seg: &Segment, len: usize, dead: bool) -> [char; 2] {
    if dead {
        return [DEAD_SNAKE_CHAR, ' '];
    }

    let entered_from_east = seg.from.opposite() == Heading::East;
    if index == 0 {
        let fill = if entered_from_east {HORIZONTAL_FILL} else {' '};
        return [seg.to.head_char(), fill];
    }

    let fill = if entered_from_east || seg.to == Heading::East {HORIZONTAL_FILL} else {' '};
    if index == len - 1 {
        [TAIL_CHAR, if seg.to == Heading::East {HORIZONTAL_FILL} else {' '}]
    } else {
        [seg.body_char(), fill]
    }
}
