//! Sensory encoding: eight rays cast from the head, three features per ray.
//!
//! The ray order and the per-ray feature order are a contract - a trained
//! controller's weights are meaningless under any other layout.

use crate::environment::{Coordinate, GridEnvironment};
use shared::INPUT_SIZE;

pub const RAY_COUNT: usize = 8;
pub const FEATURES_PER_RAY: usize = 3;

/// Ray deltas in canonical order N, NE, E, SE, S, SW, W, NW.
/// `y` grows downward, so north is negative `y`.
pub const RAY_DIRECTIONS: [(i32, i32); RAY_COUNT] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Encode the environment as 24 floats: for each ray, in order,
/// `1/d_wall`, then `1/d_food` (0 if the food is not on the ray before the
/// wall), then `1/d_body` (same rule for non-head body cells).
pub fn encode(env: &GridEnvironment) -> [f32; INPUT_SIZE] {
    let mut features = [0.0; INPUT_SIZE];
    for (i, &(dx, dy)) in RAY_DIRECTIONS.iter().enumerate() {
        let ray = cast_ray(env, dx, dy);
        features[i * FEATURES_PER_RAY..(i + 1) * FEATURES_PER_RAY].copy_from_slice(&ray);
    }
    features
}

fn cast_ray(env: &GridEnvironment, dx: i32, dy: i32) -> [f32; FEATURES_PER_RAY] {
    let head = env.head();
    let mut food_distance = None;
    let mut body_distance = None;

    let mut distance = 1;
    loop {
        let cell = head.offset(dx * distance, dy * distance);
        if !env.in_bounds(cell) {
            let inverse = |d: Option<i32>| d.map_or(0.0, |d| 1.0 / d as f32);
            return [1.0 / distance as f32, inverse(food_distance), inverse(body_distance)];
        }
        if food_distance.is_none() && cell == env.food() {
            food_distance = Some(distance);
        }
        if body_distance.is_none() && on_body_beyond_head(env, cell) {
            body_distance = Some(distance);
        }
        distance += 1;
    }
}

fn on_body_beyond_head(env: &GridEnvironment, cell: Coordinate) -> bool {
    env.body().iter().skip(1).any(|&c| c == cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Direction, EnvironmentConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn env_at(x: i32, y: i32) -> GridEnvironment {
        let config = EnvironmentConfig {
            width: 10,
            height: 10,
            start: Some(Coordinate::new(x, y)),
            ..Default::default()
        };
        GridEnvironment::new(config, &mut ChaCha8Rng::seed_from_u64(31)).unwrap()
    }

    /// Exact step count along a ray until it leaves a 10x10 grid.
    fn ray_exit_distance(x: i32, y: i32, dx: i32, dy: i32) -> i32 {
        let mut d = 1;
        loop {
            let (cx, cy) = (x + dx * d, y + dy * d);
            if !(0..10).contains(&cx) || !(0..10).contains(&cy) {
                return d;
            }
            d += 1;
        }
    }

    #[test]
    fn wall_features_match_exact_ray_distances() {
        for (x, y) in [(0, 0), (5, 5), (9, 9), (2, 7), (9, 0)] {
            let mut env = env_at(x, y);
            // Park the food off every ray through the head.
            let parked = if (x, y) == (0, 0) { (1, 2) } else { (0, 2) };
            env.force_food(Coordinate::new(parked.0, parked.1));

            let features = encode(&env);
            for (i, &(dx, dy)) in RAY_DIRECTIONS.iter().enumerate() {
                let expected = 1.0 / ray_exit_distance(x, y, dx, dy) as f32;
                assert_eq!(
                    features[i * FEATURES_PER_RAY],
                    expected,
                    "wall feature for ray ({dx},{dy}) from ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn food_feature_is_inverse_distance_on_the_ray() {
        let mut env = env_at(5, 5);
        env.force_food(Coordinate::new(8, 5)); // east, 3 cells away

        let features = encode(&env);
        let east = 2; // N, NE, E...
        assert_eq!(features[east * FEATURES_PER_RAY + 1], 1.0 / 3.0);

        // No other ray sees it.
        for i in (0..RAY_COUNT).filter(|&i| i != east) {
            assert_eq!(features[i * FEATURES_PER_RAY + 1], 0.0);
        }
    }

    #[test]
    fn food_off_every_ray_is_invisible() {
        let mut env = env_at(5, 5);
        env.force_food(Coordinate::new(7, 4)); // a knight's move away

        let features = encode(&env);
        for i in 0..RAY_COUNT {
            assert_eq!(features[i * FEATURES_PER_RAY + 1], 0.0);
        }
    }

    #[test]
    fn body_feature_sees_the_first_segment_only() {
        let mut env = env_at(5, 5);
        env.force_body(
            &[
                Coordinate::new(5, 5),
                Coordinate::new(5, 6),
                Coordinate::new(5, 7),
            ],
            Direction::Up,
        );
        env.force_food(Coordinate::new(0, 2));

        let features = encode(&env);
        let south = 4;
        assert_eq!(features[south * FEATURES_PER_RAY + 2], 1.0); // segment at distance 1

        for i in (0..RAY_COUNT).filter(|&i| i != south) {
            assert_eq!(features[i * FEATURES_PER_RAY + 2], 0.0);
        }
    }

    #[test]
    fn diagonal_ray_sees_diagonal_food() {
        let mut env = env_at(5, 5);
        env.force_food(Coordinate::new(7, 3)); // two steps NE

        let features = encode(&env);
        let north_east = 1;
        assert_eq!(features[north_east * FEATURES_PER_RAY + 1], 0.5);
    }
}
