//! Per-frame game state and its update rules.
//!
//! Every operation takes the state by value and hands back the next one, so
//! the host only ever swaps a single owned `GameState` per frame.

use rand::{seq::SliceRandom, Rng};
use tracing::{debug, info, warn};

use crate::config::Rules;
use crate::input::{Key, PressedKeys};
use crate::level::Level;
use crate::snake::{self, Heading, Segment};
use crate::Coords;

/// Turn keys in the order they are consulted each frame.
const TURN_KEYS: [(Key, Heading); 4] = [
    (Key::Left, Heading::West),
    (Key::Up, Heading::North),
    (Key::Right, Heading::East),
    (Key::Down, Heading::South),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Food {
    pub x: i32,
    pub y: i32,
    pub birth: u64,
}

impl Food {
    pub fn pos(&self) -> Coords {
        (self.x, self.y)
    }

    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.birth)
    }
}

/// Points for eating food of the given age. Goes negative past 7000 ms.
pub fn score_for_age(age: u64) -> i64 {
    (1000 + (6000 - age as i64)) / 10
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    /// Head first
    pub snake: Vec<Segment>,
    pub dir: Heading,
    pub level: Level,
    pub food: Option<Food>,
    pub score: i64,
    pub speed: u64,
    pub last_move: u64,
    pub last_spawn: u64,
    pub current_time: u64,
    pub paused: bool,
    pub dead: bool,
    pub rules: Rules,
}

impl GameState {
    /// Fresh state for `level` without food.
    pub fn init(level: Level, rules: Rules, now: u64) -> Self {
        GameState {
            snake: snake::initial_body(),
            dir: Heading::East,
            level,
            food: None,
            score: 0,
            speed: rules.start_speed,
            last_move: now,
            last_spawn: now,
            current_time: now,
            paused: false,
            dead: false,
            rules,
        }
    }

    /// `init` followed by the first food spawn.
    pub fn new_game<R: Rng + ?Sized>(level: Level, rules: Rules, now: u64, rng: &mut R) -> Self {
        info!(level = %level.name, width = level.width, height = level.height, "new game");
        GameState::init(level, rules, now).spawn_food(rng)
    }

    pub fn head(&self) -> Option<Coords> {
        self.snake.first().map(Segment::pos)
    }

    /// Runs one frame. Dead or paused states come back untouched.
    pub fn advance<R: Rng + ?Sized>(self, pressed: &PressedKeys, now: u64, rng: &mut R) -> Self {
        if self.dead || self.paused {
            return self;
        }

        let ttl = self.rules.food_ttl_ms;
        GameState { current_time: now, ..self }
            .handle_input(pressed)
            .update_food(ttl, rng)
            .move_snake(rng)
    }

    pub fn on_key_down(self, key: Key) -> Self {
        match key {
            Key::Pause => {
                debug!(paused = !self.paused, "pause toggled");
                GameState { paused: !self.paused, ..self }
            }
            _ => self,
        }
    }

    pub fn on_key_up(self, _key: Key) -> Self {
        self
    }

    /// Applies the first held turn key that does not reverse `dir`.
    pub fn handle_input(self, pressed: &PressedKeys) -> Self {
        let turn = TURN_KEYS
            .iter()
            .find(|(key, heading)| pressed.contains(*key) && *heading != self.dir.opposite());

        match turn {
            Some((_, heading)) => GameState { dir: *heading, ..self },
            None => self,
        }
    }

    /// Respawns food older than `ttl`, or retries a spawn that previously
    /// found no free cell.
    pub fn update_food<R: Rng + ?Sized>(self, ttl: u64, rng: &mut R) -> Self {
        match self.food {
            Some(food) if food.age(self.current_time) > ttl => {
                debug!(x = food.x, y = food.y, age = food.age(self.current_time), "food expired");
                self.respawn_food(Some(food.pos()), rng)
            }
            Some(_) => self,
            None => self.spawn_food(rng),
        }
    }

    pub fn spawn_food<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        self.respawn_food(None, rng)
    }

    fn respawn_food<R: Rng + ?Sized>(self, avoid: Option<Coords>, rng: &mut R) -> Self {
        let now = self.current_time;
        let cell = self
            .find_free_cell(avoid, rng)
            .or_else(|| avoid.filter(|pos| self.is_free(*pos)));

        match cell {
            Some((x, y)) => {
                debug!(x, y, "food spawned");
                GameState { food: Some(Food { x, y, birth: now }), last_spawn: now, ..self }
            }
            None => {
                warn!(length = self.snake.len(), "no free cell for food");
                GameState { food: None, ..self }
            }
        }
    }

    /// Probes random cells a bounded number of times, then picks uniformly
    /// among the remaining free cells. `None` only on a full board.
    fn find_free_cell<R: Rng + ?Sized>(&self, avoid: Option<Coords>, rng: &mut R) -> Option<Coords> {
        let usable = |pos: Coords| Some(pos) != avoid && self.is_free(pos);

        for _ in 0..self.rules.spawn_attempts {
            let pos = (rng.gen_range(0..self.level.width), rng.gen_range(0..self.level.height));
            if usable(pos) {
                return Some(pos);
            }
        }

        let free: Vec<Coords> = self.level.cells().filter(|pos| usable(*pos)).collect();
        free.choose(rng).copied()
    }

    fn is_free(&self, pos: Coords) -> bool {
        !self.level.is_wall(pos) && !self.snake.iter().any(|s| s.pos() == pos)
    }

    /// Steps the snake once `speed` ms have passed since the last step.
    pub fn move_snake<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        if self.current_time.saturating_sub(self.last_move) <= self.speed {
            return self;
        }

        let moved = snake::step(&self.snake, self.dir, self.level.width, self.level.height);
        GameState { snake: moved, last_move: self.current_time, ..self }
            .die()
            .eat_food(rng)
    }

    pub fn die(self) -> Self {
        let head = match self.head() {
            Some(head) => head,
            None => return self,
        };

        let bitten = self.snake[1..].iter().any(|s| s.pos() == head);
        if bitten || self.level.is_wall(head) {
            info!(score = self.score, length = self.snake.len(), wall = !bitten, "snake died");
            GameState { dead: true, ..self }
        } else {
            self
        }
    }

    pub fn eat_food<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let food = match self.food {
            Some(food) if self.head() == Some(food.pos()) => food,
            _ => return self,
        };

        let gained = score_for_age(food.age(self.current_time));
        let min_speed = self.rules.min_speed;

        let mut next = self.spawn_food(rng);
        snake::grow(&mut next.snake);
        next.speed = next.speed.saturating_sub(1).max(min_speed);
        next.score += gained;

        info!(gained, score = next.score, speed = next.speed, length = next.snake.len(), "food eaten");
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::builtin_levels;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};
    use crate::snake::Heading::*;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn open_level(width: i32, height: i32) -> Level {
        Level::new("test", width, height, HashSet::new()).unwrap()
    }

    fn keys(keys: &[Key]) -> PressedKeys {
        keys.iter().copied().collect()
    }

    fn state_on(level: Level) -> GameState {
        GameState::init(level, Rules::default(), 1_000)
    }

    /// A state whose snake is the given straight run of cells heading `dir`.
    fn with_snake(mut state: GameState, cells: &[Coords], dir: Heading) -> GameState {
        state.snake = cells.iter().map(|&(x, y)| Segment::new(x, y, dir, dir)).collect();
        state.dir = dir;
        state
    }

    fn food_at(state: GameState, x: i32, y: i32, birth: u64) -> GameState {
        GameState { food: Some(Food { x, y, birth }), ..state }
    }

    #[test]
    fn test_init() {
        let state = state_on(open_level(20, 10));
        assert_eq!(state.snake.len(), 3);
        assert_eq!(state.head(), Some((6, 3)));
        assert_eq!(state.dir, East);
        assert_eq!(state.speed, 80);
        assert_eq!(state.score, 0);
        assert_eq!(state.last_move, 1_000);
        assert!(state.food.is_none());
        assert!(!state.paused && !state.dead);
    }

    #[test]
    fn test_new_game_places_food_on_free_cell() {
        let level = builtin_levels().unwrap().remove(1);
        let state = GameState::new_game(level, Rules::default(), 500, &mut rng());
        let food = state.food.unwrap();

        assert_eq!(food.birth, 500);
        assert_eq!(state.last_spawn, 500);
        assert!(state.is_free(food.pos()));
    }

    #[test]
    fn test_throttle_blocks_early_steps() {
        let state = food_at(state_on(open_level(20, 10)), 15, 8, 1_000);
        let same = state.clone().advance(&keys(&[]), 1_080, &mut rng());

        assert_eq!(same.snake, state.snake);
        assert_eq!(same.last_move, 1_000);

        let moved = state.advance(&keys(&[]), 1_081, &mut rng());
        assert_eq!(moved.head(), Some((7, 3)));
        assert_eq!(moved.last_move, 1_081);
        assert_eq!(moved.snake.len(), 3);
    }

    #[test]
    fn test_wrap_on_every_edge() {
        let cases = [
            (East, vec![(9, 4), (8, 4), (7, 4)], (0, 4)),
            (West, vec![(0, 4), (1, 4), (2, 4)], (9, 4)),
            (North, vec![(4, 0), (4, 1), (4, 2)], (4, 7)),
            (South, vec![(4, 7), (4, 6), (4, 5)], (4, 0)),
        ];

        for (dir, cells, expected) in cases.iter() {
            let state = with_snake(state_on(open_level(10, 8)), cells, *dir);
            let state = food_at(state, 5, 5, 1_000);
            let moved = state.advance(&keys(&[]), 2_000, &mut rng());
            assert_eq!(moved.head(), Some(*expected), "heading {:?}", dir);
            assert!(!moved.dead);
        }
    }

    #[test]
    fn test_eating_fresh_food() {
        let state = food_at(state_on(open_level(20, 10)), 7, 3, 1_100);
        let fed = state.advance(&keys(&[]), 1_100, &mut rng());

        assert_eq!(fed.score, 700);
        assert_eq!(fed.snake.len(), 4);
        assert_eq!(fed.speed, 79);
        let food = fed.food.unwrap();
        assert_ne!(food.pos(), (7, 3));
        assert_eq!(food.birth, 1_100);
        assert!(fed.is_free(food.pos()));

        // The duplicated tail stays behind on the next step
        let fed = food_at(fed, 15, 8, 1_100);
        let fed = fed.advance(&keys(&[]), 1_200, &mut rng());
        assert_eq!(fed.snake.len(), 4);
        assert_eq!(fed.snake[3].pos(), (5, 3));
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(score_for_age(0), 700);
        assert_eq!(score_for_age(6_000), 100);
        assert_eq!(score_for_age(7_000), 0);
        assert_eq!(score_for_age(8_005), -100);
        // Truncates toward zero
        assert_eq!(score_for_age(7_005), 0);
        assert_eq!(score_for_age(15), 698);
    }

    #[test]
    fn test_speed_floor() {
        let mut state = food_at(state_on(open_level(20, 10)), 7, 3, 1_000);
        state.speed = 5;
        state.last_move = 0;
        let fed = state.advance(&keys(&[]), 1_000, &mut rng());
        assert_eq!(fed.speed, 5);
        assert_eq!(fed.snake.len(), 4);
    }

    #[test]
    fn test_self_collision() {
        // Turning west runs the head into its own body
        let mut state = state_on(open_level(20, 10));
        state.snake = vec![
            Segment::new(5, 5, North, North),
            Segment::new(5, 6, East, North),
            Segment::new(4, 6, East, East),
            Segment::new(4, 5, South, East),
            Segment::new(4, 4, South, South),
        ];
        state.dir = North;
        let state = food_at(state, 15, 8, 1_000);

        let turned = state.advance(&keys(&[Key::Left]), 2_000, &mut rng());
        assert_eq!(turned.head(), Some((4, 5)));
        assert!(turned.dead);
    }

    #[test]
    fn test_chasing_the_tail_is_safe() {
        // A 4-cell square: the head moves into the cell the tail just left
        let mut state = state_on(open_level(20, 10));
        state.snake = vec![
            Segment::new(5, 5, East, East),
            Segment::new(4, 5, North, East),
            Segment::new(4, 6, West, North),
            Segment::new(5, 6, West, West),
        ];
        state.dir = South;
        let state = food_at(state, 15, 8, 1_000);

        let moved = state.advance(&keys(&[]), 2_000, &mut rng());
        assert_eq!(moved.head(), Some((5, 6)));
        assert!(!moved.dead);
    }

    #[test]
    fn test_wall_collision() {
        let mut walls = HashSet::new();
        walls.insert((7, 3));
        let level = Level::new("wall", 20, 10, walls).unwrap();
        let state = food_at(state_on(level), 15, 8, 1_000);

        let hit = state.advance(&keys(&[]), 2_000, &mut rng());
        assert!(hit.dead);

        // Dead is terminal
        let later = hit.clone().advance(&keys(&[Key::Up]), 9_000, &mut rng());
        assert_eq!(later, hit);
    }

    #[test]
    fn test_reversal_is_rejected() {
        let state = state_on(open_level(20, 10));
        let same = state.clone().handle_input(&keys(&[Key::Left]));
        assert_eq!(same.dir, East);

        // Left is ineligible, so up wins even though left has priority
        let turned = state.clone().handle_input(&keys(&[Key::Left, Key::Up]));
        assert_eq!(turned.dir, North);

        let turned = state.handle_input(&keys(&[Key::Down, Key::Right, Key::Up]));
        assert_eq!(turned.dir, North);
    }

    #[test]
    fn test_turns_are_checked_against_current_dir() {
        let state = state_on(open_level(20, 10));
        let north = state.handle_input(&keys(&[Key::Up]));
        assert_eq!(north.dir, North);

        // Only the reverse of `dir` is blocked, even before the snake has stepped north
        let west = north.handle_input(&keys(&[Key::Left]));
        assert_eq!(west.dir, West);
    }

    #[test]
    fn test_pause_toggle() {
        let state = state_on(open_level(20, 10));
        let paused = state.clone().on_key_down(Key::Pause);
        assert!(paused.paused);
        assert_eq!(paused.clone().on_key_down(Key::Up), paused);
        assert_eq!(paused.clone().on_key_up(Key::Pause), paused);
        assert!(!paused.on_key_down(Key::Pause).paused);
    }

    #[test]
    fn test_food_expires() {
        let state = food_at(state_on(open_level(20, 10)), 15, 8, 1_000);

        let kept = state.clone().update_food(10_000, &mut rng());
        let kept = GameState { current_time: 11_000, ..kept }.update_food(10_000, &mut rng());
        assert_eq!(kept.food.unwrap().pos(), (15, 8));

        let expired = GameState { current_time: 11_001, ..state }.update_food(10_000, &mut rng());
        let food = expired.food.unwrap();
        assert_ne!(food.pos(), (15, 8));
        assert_eq!(food.birth, 11_001);
        assert_eq!(expired.last_spawn, 11_001);
        assert!(expired.is_free(food.pos()));
    }

    #[test]
    fn test_expired_food_replaced_on_advance() {
        let state = food_at(state_on(open_level(20, 10)), 15, 8, 1_000);
        let state = GameState { last_move: 11_500, ..state };
        let next = state.advance(&keys(&[]), 11_500, &mut rng());
        let food = next.food.unwrap();
        assert_ne!(food.pos(), (15, 8));
        assert_eq!(food.birth, 11_500);
    }

    #[test]
    fn test_saturated_board_leaves_no_food_then_retries() {
        // 7x4 board fully walled apart from the snake and a single cell
        let mut walls: HashSet<Coords> = open_level(7, 4).cells().collect();
        for pos in &[(4, 3), (5, 3), (6, 3), (0, 0)] {
            walls.remove(pos);
        }
        let level = Level::new("tight", 7, 4, walls.clone()).unwrap();

        let state = GameState::init(level, Rules::default(), 0).spawn_food(&mut rng());
        assert_eq!(state.food.unwrap().pos(), (0, 0));

        // Only the old food cell is free, so expiry reuses it
        let again = GameState { current_time: 20_000, ..state }.update_food(10_000, &mut rng());
        assert_eq!(again.food.unwrap().pos(), (0, 0));

        walls.insert((0, 0));
        let full = Level::new("full", 7, 4, walls).unwrap();
        let state = GameState::init(full, Rules::default(), 0).spawn_food(&mut rng());
        assert!(state.food.is_none());

        // A later tick tries again instead of hanging
        let state = state.update_food(10_000, &mut rng());
        assert!(state.food.is_none());
    }

    #[test]
    fn test_update_food_spawns_when_missing() {
        let state = state_on(open_level(20, 10));
        let state = GameState { current_time: 4_000, ..state }.update_food(10_000, &mut rng());
        assert_eq!(state.food.unwrap().birth, 4_000);
    }

    fn heading() -> impl Strategy<Value = Heading> {
        prop_oneof![Just(North), Just(East), Just(South), Just(West)]
    }

    fn turn_key() -> impl Strategy<Value = Key> {
        prop_oneof![Just(Key::Left), Just(Key::Up), Just(Key::Right), Just(Key::Down)]
    }

    fn key_for(heading: Heading) -> Key {
        match heading {
            North => Key::Up,
            East => Key::Right,
            South => Key::Down,
            West => Key::Left,
        }
    }

    proptest! {
        #[test]
        fn prop_throttle_holds(delta in 0u64..=80, seed in any::<u64>()) {
            let state = food_at(state_on(open_level(20, 10)), 15, 8, 1_000);
            let next = state.clone().advance(&keys(&[]), 1_000 + delta, &mut StdRng::seed_from_u64(seed));
            prop_assert_eq!(next.snake, state.snake);
            prop_assert_eq!(next.score, state.score);
            prop_assert_eq!(next.food, state.food);
        }

        #[test]
        fn prop_paused_is_idempotent(delta in 0u64..1_000_000, key in turn_key()) {
            let state = food_at(state_on(open_level(20, 10)), 15, 8, 1_000).on_key_down(Key::Pause);
            let next = state.clone().advance(&keys(&[key]), 1_000 + delta, &mut rng());
            prop_assert_eq!(next, state);
        }

        #[test]
        fn prop_reverse_key_never_turns(dir in heading()) {
            let mut state = state_on(open_level(20, 10));
            state.dir = dir;
            state.snake[0].to = dir;
            let next = state.handle_input(&keys(&[key_for(dir.opposite())]));
            prop_assert_eq!(next.dir, dir);
        }

        #[test]
        fn prop_head_stays_on_board(x in 0i32..12, y in 0i32..9, dir in heading()) {
            let state = with_snake(state_on(open_level(12, 9)), &[(x, y)], dir);
            let state = food_at(state, -1, -1, 1_000);
            let moved = state.advance(&keys(&[]), 5_000, &mut rng());
            let (hx, hy) = moved.head().unwrap();
            prop_assert!(hx >= 0 && hx < 12 && hy >= 0 && hy < 9);
        }
    }
}
