use crate::{Result, SimError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A grid cell. `x` grows to the right, `y` grows downward; the playable
/// area is `[0, width) x [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// The four axis directions. The declaration order Up, Down, Left, Right is
/// the canonical action order and maps 1:1 to controller outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Canonical action order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Why an episode ended. Death is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// The head left the grid.
    Wall,
    /// The head entered a cell of the current body, the tail included.
    SelfCollision,
    /// `remaining_life` ran out.
    Exhausted,
    /// Too many consecutive steps without eating.
    Starved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub width: i32,
    pub height: i32,

    /// Head cell at reset; `None` means the grid center.
    pub start: Option<Coordinate>,
    pub initial_direction: Direction,

    pub initial_life: i32,
    /// Life granted on eating, applied before the cap.
    pub food_life_bonus: i32,
    /// Upper bound on `remaining_life` after a food bonus.
    pub max_life: i32,
    /// Consecutive foodless steps beyond this count are fatal.
    pub starvation_limit: u32,

    /// Food is rejected closer than this Manhattan distance to the head.
    /// 0 means only occupancy matters.
    pub min_food_distance: u32,
    /// Placement attempts before giving up with [`SimError::GridFull`].
    pub food_retry_limit: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 30,
            start: None,
            initial_direction: Direction::Right,
            initial_life: 200,
            food_life_bonus: 100,
            max_life: 500,
            starvation_limit: 100,
            min_food_distance: 0,
            food_retry_limit: 1000,
        }
    }
}

/// What a single `step` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved into a free cell; body length unchanged.
    Moved,
    /// Ate the food; body grew by one and food respawned.
    Ate,
    Died(DeathCause),
}

/// One agent's episode state and the movement/collision/food rules.
///
/// Deterministic given its config and the supplied random stream; holds no
/// global state. A new episode is a new value.
#[derive(Debug, Clone)]
pub struct GridEnvironment {
    config: EnvironmentConfig,
    body: VecDeque<Coordinate>,
    direction: Direction,
    food: Coordinate,
    score: u32,
    remaining_life: i32,
    moves_without_food: u32,
    steps_taken: u32,
    alive: bool,
    death: Option<DeathCause>,
}

impl GridEnvironment {
    /// Start a fresh episode: single-cell body at the configured start,
    /// full life, food placed via rejection sampling.
    pub fn new<R: Rng>(config: EnvironmentConfig, rng: &mut R) -> Result<Self> {
        validate(&config)?;

        let start = config
            .start
            .unwrap_or_else(|| Coordinate::new(config.width / 2, config.height / 2));
        let mut body = VecDeque::new();
        body.push_front(start);

        let mut env = Self {
            direction: config.initial_direction,
            food: start,
            score: 0,
            remaining_life: config.initial_life,
            moves_without_food: 0,
            steps_taken: 0,
            alive: true,
            death: None,
            config,
            body,
        };
        env.food = env.place_food(rng)?;
        Ok(env)
    }

    /// Sample a uniformly random cell until one is free and far enough from
    /// the head. Bounded: a grid too full to satisfy the policy surfaces as
    /// [`SimError::GridFull`] instead of looping forever.
    fn place_food<R: Rng>(&self, rng: &mut R) -> Result<Coordinate> {
        let head = self.head();
        for _ in 0..self.config.food_retry_limit {
            let candidate = Coordinate::new(
                rng.gen_range(0..self.config.width),
                rng.gen_range(0..self.config.height),
            );
            if self.body.contains(&candidate) {
                continue;
            }
            if candidate.manhattan(head) < self.config.min_food_distance {
                continue;
            }
            return Ok(candidate);
        }
        Err(SimError::GridFull {
            attempts: self.config.food_retry_limit,
        })
    }

    /// Advance one tick in `requested` direction.
    ///
    /// A request that exactly reverses the current direction is ignored and
    /// the snake keeps going straight. Death checks run in a fixed order:
    /// wall first, then self-collision against the current body - the tail
    /// cell that would be vacated this tick is still fatal.
    pub fn step<R: Rng>(&mut self, requested: Direction, rng: &mut R) -> Result<StepOutcome> {
        if let Some(cause) = self.death {
            return Ok(StepOutcome::Died(cause));
        }

        if requested != self.direction.opposite() {
            self.direction = requested;
        }
        let (dx, dy) = self.direction.delta();
        let new_head = self.head().offset(dx, dy);

        if !self.in_bounds(new_head) {
            return Ok(self.kill(DeathCause::Wall));
        }
        if self.body.contains(&new_head) {
            return Ok(self.kill(DeathCause::SelfCollision));
        }

        self.body.push_front(new_head);
        let ate = new_head == self.food;
        if ate {
            self.score += 1;
            self.food = self.place_food(rng)?;
            self.remaining_life =
                (self.remaining_life + self.config.food_life_bonus).min(self.config.max_life);
            self.moves_without_food = 0;
        } else {
            self.body.pop_back();
            self.moves_without_food += 1;
        }

        self.remaining_life -= 1;
        self.steps_taken += 1;

        if self.remaining_life <= 0 {
            return Ok(self.kill(DeathCause::Exhausted));
        }
        if self.moves_without_food > self.config.starvation_limit {
            return Ok(self.kill(DeathCause::Starved));
        }
        Ok(if ate { StepOutcome::Ate } else { StepOutcome::Moved })
    }

    fn kill(&mut self, cause: DeathCause) -> StepOutcome {
        self.alive = false;
        self.death = Some(cause);
        StepOutcome::Died(cause)
    }

    pub fn in_bounds(&self, cell: Coordinate) -> bool {
        cell.x >= 0 && cell.x < self.config.width && cell.y >= 0 && cell.y < self.config.height
    }

    /// In bounds and not occupied by the body.
    pub fn is_free(&self, cell: Coordinate) -> bool {
        self.in_bounds(cell) && !self.body.contains(&cell)
    }

    pub fn head(&self) -> Coordinate {
        *self.body.front().expect("body is never empty")
    }

    pub fn body(&self) -> &VecDeque<Coordinate> {
        &self.body
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn food(&self) -> Coordinate {
        self.food
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn remaining_life(&self) -> i32 {
        self.remaining_life
    }

    pub fn moves_without_food(&self) -> u32 {
        self.moves_without_food
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    pub fn alive(&self) -> bool {
        self.alive
    }

    pub fn death_cause(&self) -> Option<DeathCause> {
        self.death
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn force_food(&mut self, cell: Coordinate) {
        self.food = cell;
    }

    #[cfg(test)]
    pub(crate) fn force_body(&mut self, cells: &[Coordinate], direction: Direction) {
        self.body = cells.iter().copied().collect();
        self.direction = direction;
    }
}

fn validate(config: &EnvironmentConfig) -> Result<()> {
    if config.width < 2 || config.height < 2 {
        return Err(SimError::InvalidConfig(format!(
            "grid {}x{} is too small",
            config.width, config.height
        )));
    }
    if let Some(start) = config.start {
        let inside = start.x >= 0 && start.x < config.width && start.y >= 0 && start.y < config.height;
        if !inside {
            return Err(SimError::InvalidConfig(format!(
                "start {:?} is outside the {}x{} grid",
                start, config.width, config.height
            )));
        }
    }
    if config.initial_life <= 0 {
        return Err(SimError::InvalidConfig(
            "initial_life must be positive".into(),
        ));
    }
    if config.food_retry_limit == 0 {
        return Err(SimError::InvalidConfig(
            "food_retry_limit must be positive".into(),
        ));
    }
    Ok(())
}
