//! Generational evolution: parallel episode evaluation, tournament
//! selection, elitism, crossover, and mutation.

use crate::environment::EnvironmentConfig;
use crate::fitness::{evaluate_episode, FitnessFormula};
use crate::policy::PolicyConfig;
use crate::{Result, SimError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shared::NeuralController;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Entrants per tournament; the fittest entrant becomes a parent.
    pub tournament_size: usize,
    /// Top members copied unchanged into the next generation.
    pub elitism: usize,
    pub mutation_rate: f32,
    pub mutation_magnitude: f32,
    /// Per-episode step cap.
    pub step_budget: u32,
    pub fitness_formula: FitnessFormula,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            tournament_size: 5,
            elitism: 1,
            mutation_rate: 0.2,
            mutation_magnitude: 0.3,
            step_budget: 1000,
            fitness_formula: FitnessFormula::default(),
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(SimError::InvalidConfig(
                "population_size must be at least 2".into(),
            ));
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return Err(SimError::InvalidConfig(format!(
                "tournament_size {} must be between 1 and the population size",
                self.tournament_size
            )));
        }
        if self.elitism >= self.population_size {
            return Err(SimError::InvalidConfig(
                "elitism must leave room for offspring".into(),
            ));
        }
        if self.step_budget == 0 {
            return Err(SimError::InvalidConfig(
                "step_budget must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One controller plus its scores from the latest evaluated generation.
#[derive(Debug, Clone)]
pub struct PopulationMember {
    pub controller: NeuralController,
    pub fitness: f64,
    pub score: u32,
}

/// Summary statistics for one completed generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub generation: u32,
    pub best_fitness: f64,
    pub best_score: u32,
    pub mean_fitness: f64,
}

/// The fittest controller seen across the whole run so far.
#[derive(Debug, Clone)]
pub struct BestRecord {
    pub controller: NeuralController,
    pub fitness: f64,
    pub score: u32,
    pub generation: u32,
}

/// Drives the population through evaluate/select/breed cycles.
///
/// All randomness descends from `master_seed`: each episode draws from its
/// own stream derived from (seed, generation, member index), so parallel
/// evaluation and a sequential rerun produce identical results. Breeding
/// uses a single sequential stream.
pub struct EvolutionEngine {
    env_config: EnvironmentConfig,
    policy: PolicyConfig,
    config: EvolutionConfig,
    master_seed: u64,
    population: Vec<PopulationMember>,
    generation: u32,
    best: Option<BestRecord>,
    rng: ChaCha8Rng,
}

impl EvolutionEngine {
    pub fn new(
        env_config: EnvironmentConfig,
        policy: PolicyConfig,
        config: EvolutionConfig,
        master_seed: u64,
    ) -> Result<Self> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(master_seed);
        let population = (0..config.population_size)
            .map(|_| PopulationMember {
                controller: NeuralController::random(&mut rng),
                fitness: 0.0,
                score: 0,
            })
            .collect();

        Ok(Self {
            env_config,
            policy,
            config,
            master_seed,
            population,
            generation: 0,
            best: None,
            rng,
        })
    }

    /// Restart from a saved controller: slot 0 keeps it verbatim, every
    /// other slot gets a mutated copy.
    pub fn seed_population(&mut self, controller: NeuralController) {
        for (i, member) in self.population.iter_mut().enumerate() {
            let mut seeded = controller.clone();
            if i > 0 {
                seeded.mutate(
                    self.config.mutation_rate,
                    self.config.mutation_magnitude,
                    &mut self.rng,
                );
            }
            member.controller = seeded;
            member.fitness = 0.0;
            member.score = 0;
        }
    }

    /// Evaluate every member, refresh the best record, and breed the next
    /// population.
    pub fn run_generation(&mut self) -> Result<GenerationReport> {
        let generation = self.generation;
        let results: Vec<_> = self
            .population
            .par_iter()
            .enumerate()
            .map(|(i, member)| {
                let seed = episode_seed(self.master_seed, generation, i as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                evaluate_episode(
                    &self.env_config,
                    &self.policy,
                    self.config.fitness_formula,
                    &member.controller,
                    self.config.step_budget,
                    &mut rng,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        for (member, result) in self.population.iter_mut().zip(&results) {
            member.fitness = result.fitness;
            member.score = result.score;
        }

        let mut ranked: Vec<usize> = (0..self.population.len()).collect();
        ranked.sort_by(|&a, &b| {
            self.population[b]
                .fitness
                .partial_cmp(&self.population[a].fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let champion = &self.population[ranked[0]];
        let improved = self
            .best
            .as_ref()
            .map_or(true, |best| champion.fitness > best.fitness);
        if improved {
            self.best = Some(BestRecord {
                controller: champion.controller.clone(),
                fitness: champion.fitness,
                score: champion.score,
                generation,
            });
        }

        let mean_fitness =
            self.population.iter().map(|m| m.fitness).sum::<f64>() / self.population.len() as f64;
        let report = GenerationReport {
            generation,
            best_fitness: champion.fitness,
            best_score: champion.score,
            mean_fitness,
        };

        self.population = self.breed(&ranked)?;
        self.generation += 1;

        tracing::info!(
            generation = report.generation,
            best_fitness = report.best_fitness,
            best_score = report.best_score,
            mean_fitness = report.mean_fitness,
            "generation complete"
        );
        Ok(report)
    }

    /// Elites carry over verbatim; every other slot is bred from two
    /// tournament winners, crossed over, and mutated.
    fn breed(&mut self, ranked: &[usize]) -> Result<Vec<PopulationMember>> {
        let mut next = Vec::with_capacity(self.population.len());

        for &i in ranked.iter().take(self.config.elitism) {
            next.push(self.population[i].clone());
        }

        while next.len() < self.population.len() {
            let first = self.tournament_winner();
            let second = self.tournament_winner();
            let mut child = self.population[first]
                .controller
                .crossover(&self.population[second].controller, &mut self.rng);
            child.mutate(
                self.config.mutation_rate,
                self.config.mutation_magnitude,
                &mut self.rng,
            );
            if !child.is_finite() {
                return Err(SimError::NonFiniteParameters);
            }
            next.push(PopulationMember {
                controller: child,
                fitness: 0.0,
                score: 0,
            });
        }
        Ok(next)
    }

    /// Sample `tournament_size` distinct members and return the fittest.
    fn tournament_winner(&mut self) -> usize {
        rand::seq::index::sample(
            &mut self.rng,
            self.population.len(),
            self.config.tournament_size,
        )
        .iter()
        .max_by(|&a, &b| {
            self.population[a]
                .fitness
                .partial_cmp(&self.population[b].fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("tournament_size is validated nonzero")
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn population(&self) -> &[PopulationMember] {
        &self.population
    }

    pub fn best(&self) -> Option<&BestRecord> {
        self.best.as_ref()
    }
}

/// Derive the episode RNG seed for one member of one generation. The mix is
/// a splitmix64 finalizer, so nearby (generation, member) pairs land on
/// unrelated streams.
fn episode_seed(master: u64, generation: u32, member: u64) -> u64 {
    let mut z = master
        ^ (generation as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ member.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
