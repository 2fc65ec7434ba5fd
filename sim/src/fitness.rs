//! Episode rollout and fitness scoring.

use crate::environment::{DeathCause, EnvironmentConfig, GridEnvironment};
use crate::policy::{select_action, PolicyConfig};
use crate::vision;
use crate::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::NeuralController;

/// How an episode's raw counters collapse into a single scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessFormula {
    /// Survival time squared, doubled per food up to ten, then a linear
    /// climb. Rewards early survival, then makes food dominate.
    #[default]
    ExponentialScore,

    /// Food first at a large flat rate, survival second, with a penalty for
    /// wandering without eating.
    ScoreDriven,
}

impl FitnessFormula {
    /// Fitness is always at least 1 so selection pressure never divides by
    /// or compares against zero.
    pub fn score(self, steps: u32, score: u32, moves_without_food: u32) -> f64 {
        let steps = steps as f64;
        let value = match self {
            FitnessFormula::ExponentialScore => {
                let capped = score.min(10);
                let mut fitness = steps * steps * f64::powi(2.0, capped as i32);
                if score > 10 {
                    fitness *= (score - 9) as f64;
                }
                fitness
            }
            FitnessFormula::ScoreDriven => {
                1000.0 * score as f64 + 10.0 * steps - 5.0 * moves_without_food as f64
            }
        };
        value.max(1.0)
    }
}

/// Raw outcome of one evaluated episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeResult {
    pub fitness: f64,
    pub score: u32,
    pub steps: u32,
    pub death: Option<DeathCause>,
}

/// Roll out one controller in a fresh environment until death or the step
/// budget, then score the run.
pub fn evaluate_episode<R: Rng>(
    env_config: &EnvironmentConfig,
    policy: &PolicyConfig,
    formula: FitnessFormula,
    controller: &NeuralController,
    step_budget: u32,
    rng: &mut R,
) -> Result<EpisodeResult> {
    let mut env = GridEnvironment::new(env_config.clone(), rng)?;

    while env.alive() && env.steps_taken() < step_budget {
        let features = vision::encode(&env);
        let scores = controller.forward(&features);
        let action = select_action(&scores, &env, policy);
        env.step(action, rng)?;
    }

    let result = EpisodeResult {
        fitness: formula.score(env.steps_taken(), env.score(), env.moves_without_food()),
        score: env.score(),
        steps: env.steps_taken(),
        death: env.death_cause(),
    };
    tracing::debug!(
        score = result.score,
        steps = result.steps,
        fitness = result.fitness,
        death = ?result.death,
        "episode finished"
    );
    Ok(result)
}
