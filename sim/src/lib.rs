//! Deterministic snake simulation and the evolutionary loop that trains
//! neural controllers to play it.

pub mod environment;
pub mod evolution;
pub mod fitness;
pub mod policy;
pub mod vision;

pub use environment::{
    Coordinate, DeathCause, Direction, EnvironmentConfig, GridEnvironment, StepOutcome,
};
pub use evolution::{
    BestRecord, EvolutionConfig, EvolutionEngine, GenerationReport, PopulationMember,
};
pub use fitness::{evaluate_episode, EpisodeResult, FitnessFormula};
pub use policy::{select_action, PolicyConfig};
pub use vision::encode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no free cell for food after {attempts} attempts - grid too full")]
    GridFull { attempts: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("breeding produced non-finite controller parameters")]
    NonFiniteParameters,
}

pub type Result<T> = std::result::Result<T, SimError>;

/// The outcome of a full training run.
pub struct EvolutionRun {
    pub reports: Vec<GenerationReport>,
    pub best: BestRecord,
}

/// Run `generations` evaluate/breed cycles from a fresh random population.
///
/// A convenience wrapper over [`EvolutionEngine`] for callers that do not
/// need per-generation control.
pub fn run_evolution(
    env_config: EnvironmentConfig,
    policy: PolicyConfig,
    evolution: EvolutionConfig,
    master_seed: u64,
    generations: u32,
) -> Result<EvolutionRun> {
    if generations == 0 {
        return Err(SimError::InvalidConfig(
            "generations must be positive".into(),
        ));
    }

    tracing::info!(
        master_seed,
        generations,
        population = evolution.population_size,
        "starting evolution run"
    );

    let mut engine = EvolutionEngine::new(env_config, policy, evolution, master_seed)?;
    let mut reports = Vec::with_capacity(generations as usize);
    for _ in 0..generations {
        reports.push(engine.run_generation()?);
    }

    let best = engine
        .best()
        .cloned()
        .expect("at least one generation ran");
    Ok(EvolutionRun { reports, best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use shared::{ControllerRecord, HIDDEN_SIZE, INPUT_SIZE, NeuralController, OUTPUT_SIZE};

    /// A controller that always picks the same action: zero weights, with a
    /// single large output bias.
    fn rigged_controller(action: usize) -> NeuralController {
        let mut b3 = vec![0.0; OUTPUT_SIZE];
        b3[action] = 10.0;
        ControllerRecord {
            version: shared::CHECKPOINT_VERSION,
            layer_sizes: [INPUT_SIZE, HIDDEN_SIZE, HIDDEN_SIZE, OUTPUT_SIZE],
            w1: vec![0.0; INPUT_SIZE * HIDDEN_SIZE],
            w2: vec![0.0; HIDDEN_SIZE * HIDDEN_SIZE],
            w3: vec![0.0; HIDDEN_SIZE * OUTPUT_SIZE],
            b1: vec![0.0; HIDDEN_SIZE],
            b2: vec![0.0; HIDDEN_SIZE],
            b3,
        }
        .into_controller()
        .unwrap()
    }

    #[test]
    fn rigged_controller_walks_into_the_food() {
        let config = EnvironmentConfig {
            width: 10,
            height: 10,
            start: Some(Coordinate::new(5, 5)),
            ..Default::default()
        };
        let mut env = GridEnvironment::new(config, &mut ChaCha8Rng::seed_from_u64(61)).unwrap();
        env.force_food(Coordinate::new(8, 5));

        let controller = rigged_controller(3); // Right
        let policy = PolicyConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(62);

        let mut last = StepOutcome::Moved;
        for _ in 0..3 {
            let features = encode(&env);
            let scores = controller.forward(&features);
            let action = select_action(&scores, &env, &policy);
            last = env.step(action, &mut rng).unwrap();
        }

        assert_eq!(last, StepOutcome::Ate);
        assert_eq!(env.score(), 1);
        assert_eq!(env.body().len(), 2);
        assert_eq!(env.steps_taken(), 3);
        // Initial life plus the food bonus, minus three ticks.
        assert_eq!(env.remaining_life(), 200 + 100 - 3);
    }

    #[test]
    fn full_runs_with_the_same_seed_are_identical() {
        let env_config = EnvironmentConfig {
            width: 12,
            height: 12,
            initial_life: 50,
            starvation_limit: 30,
            ..Default::default()
        };
        let evolution = EvolutionConfig {
            population_size: 6,
            tournament_size: 2,
            step_budget: 60,
            ..Default::default()
        };

        let run = || {
            run_evolution(
                env_config.clone(),
                PolicyConfig::default(),
                evolution.clone(),
                4242,
                3,
            )
            .unwrap()
        };
        let a = run();
        let b = run();

        assert_eq!(a.reports, b.reports);
        assert_eq!(a.best.controller, b.best.controller);
        assert_eq!(a.best.fitness, b.best.fitness);
    }

    #[test]
    fn run_returns_one_report_per_generation() {
        let evolution = EvolutionConfig {
            population_size: 4,
            tournament_size: 2,
            step_budget: 40,
            ..Default::default()
        };
        let env_config = EnvironmentConfig {
            width: 10,
            height: 10,
            initial_life: 30,
            starvation_limit: 20,
            ..Default::default()
        };

        let run = run_evolution(env_config, PolicyConfig::default(), evolution, 9, 4).unwrap();

        assert_eq!(run.reports.len(), 4);
        for (i, report) in run.reports.iter().enumerate() {
            assert_eq!(report.generation, i as u32);
        }
        assert!(run.best.fitness >= 1.0);
    }

    #[test]
    fn zero_generations_is_an_error() {
        let result = run_evolution(
            EnvironmentConfig::default(),
            PolicyConfig::default(),
            EvolutionConfig::default(),
            1,
            0,
        );
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }
}
