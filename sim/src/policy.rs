//! Action selection: map controller outputs to a direction, with safety
//! fallbacks for the moves the environment would waste or punish.

use crate::environment::{Direction, GridEnvironment};
use serde::{Deserialize, Serialize};
use shared::OUTPUT_SIZE;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Below this top score the controller is treated as undecided and the
    /// fallback runs. `None` disables the check.
    pub confidence_threshold: Option<f32>,

    /// When falling back, prefer the axis move that closes the gap to the
    /// food before scanning for any safe direction.
    pub food_heuristic: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: Some(0.35),
            food_heuristic: true,
        }
    }
}

/// Pick the direction to request this tick.
///
/// The argmax of `scores` wins outright when it is confident and does not
/// reverse the current direction (ties break toward the earliest action in
/// canonical order). Otherwise the fallback picks, in order: the food-seeking
/// axis move if enabled and safe, the first safe non-reversing direction in
/// canonical order, and finally the current direction.
pub fn select_action(
    scores: &[f32; OUTPUT_SIZE],
    env: &GridEnvironment,
    config: &PolicyConfig,
) -> Direction {
    let (index, top) = scores
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bs), (i, s)| {
            if s > bs {
                (i, s)
            } else {
                (bi, bs)
            }
        });
    let choice = Direction::ALL[index];

    let confident = config.confidence_threshold.map_or(true, |t| top >= t);
    if confident && choice != env.direction().opposite() {
        return choice;
    }

    fallback(env, config)
}

fn fallback(env: &GridEnvironment, config: &PolicyConfig) -> Direction {
    if config.food_heuristic {
        if let Some(dir) = step_toward_food(env) {
            return dir;
        }
    }
    for dir in Direction::ALL {
        if dir != env.direction().opposite() && safe(env, dir) {
            return dir;
        }
    }
    env.direction()
}

/// The axis move that closes the larger of the two gaps to the food, if it
/// is non-reversing and immediately safe.
fn step_toward_food(env: &GridEnvironment) -> Option<Direction> {
    let head = env.head();
    let food = env.food();
    let (dx, dy) = (food.x - head.x, food.y - head.y);

    let preferred = if dx.abs() >= dy.abs() {
        match dx.signum() {
            1 => Some(Direction::Right),
            -1 => Some(Direction::Left),
            _ => None,
        }
    } else {
        match dy.signum() {
            1 => Some(Direction::Down),
            -1 => Some(Direction::Up),
            _ => None,
        }
    };

    preferred.filter(|&dir| dir != env.direction().opposite() && safe(env, dir))
}

fn safe(env: &GridEnvironment, dir: Direction) -> bool {
    let (dx, dy) = dir.delta();
    env.is_free(env.head().offset(dx, dy))
}
