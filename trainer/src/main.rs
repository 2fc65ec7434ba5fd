use anyhow::{Context, Result};
use clap::Parser;
use shared::ControllerRecord;
use sim::{
    Coordinate, EnvironmentConfig, EvolutionConfig, EvolutionEngine, FitnessFormula, PolicyConfig,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Evolve snake-playing neural controllers and save the best one found.
#[derive(Debug, Parser)]
#[command(name = "trainer", version, about)]
struct Args {
    /// Grid width in cells.
    #[arg(long, default_value_t = 40)]
    width: i32,

    /// Grid height in cells.
    #[arg(long, default_value_t = 30)]
    height: i32,

    /// Snake start cell as X,Y; defaults to the grid center.
    #[arg(long, value_parser = parse_coordinate)]
    start: Option<Coordinate>,

    /// Controllers per generation.
    #[arg(long, default_value_t = 50)]
    population: usize,

    /// Generations to run.
    #[arg(long, default_value_t = 100)]
    generations: u32,

    /// Master seed; a run with the same seed and settings replays exactly.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Probability that a weight matrix is perturbed during mutation.
    #[arg(long, default_value_t = 0.2)]
    mutation_rate: f32,

    /// Standard deviation of the mutation noise.
    #[arg(long, default_value_t = 0.3)]
    mutation_magnitude: f32,

    /// Entrants per selection tournament.
    #[arg(long, default_value_t = 5)]
    tournament_size: usize,

    /// Top members copied unchanged into the next generation.
    #[arg(long, default_value_t = 1)]
    elitism: usize,

    /// Per-episode step cap.
    #[arg(long, default_value_t = 1000)]
    step_budget: u32,

    /// Fitness formula: "exponential-score" or "score-driven".
    #[arg(long, default_value = "exponential-score", value_parser = parse_formula)]
    fitness: FitnessFormula,

    /// Disable the food-seeking fallback when the controller is undecided.
    #[arg(long)]
    no_food_heuristic: bool,

    /// Where to write the best controller as JSON.
    #[arg(long, default_value = "best_controller.json")]
    out: PathBuf,

    /// Resume from a previously saved controller checkpoint.
    #[arg(long)]
    resume: Option<PathBuf>,
}

fn parse_coordinate(value: &str) -> std::result::Result<Coordinate, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {value:?}"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<i32>()
            .map_err(|e| format!("bad coordinate {s:?}: {e}"))
    };
    Ok(Coordinate::new(parse(x)?, parse(y)?))
}

fn parse_formula(value: &str) -> std::result::Result<FitnessFormula, String> {
    match value {
        "exponential-score" => Ok(FitnessFormula::ExponentialScore),
        "score-driven" => Ok(FitnessFormula::ScoreDriven),
        other => Err(format!(
            "unknown fitness formula {other:?} (use exponential-score or score-driven)"
        )),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trainer=info,sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let env_config = EnvironmentConfig {
        width: args.width,
        height: args.height,
        start: args.start,
        ..Default::default()
    };
    let policy = PolicyConfig {
        food_heuristic: !args.no_food_heuristic,
        ..Default::default()
    };
    let evolution = EvolutionConfig {
        population_size: args.population,
        tournament_size: args.tournament_size,
        elitism: args.elitism,
        mutation_rate: args.mutation_rate,
        mutation_magnitude: args.mutation_magnitude,
        step_budget: args.step_budget,
        fitness_formula: args.fitness,
    };

    tracing::info!(
        seed = args.seed,
        generations = args.generations,
        population = args.population,
        grid = %format!("{}x{}", args.width, args.height),
        "starting trainer"
    );

    let mut engine = EvolutionEngine::new(env_config, policy, evolution, args.seed)
        .context("invalid training configuration")?;

    if let Some(path) = &args.resume {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading checkpoint {}", path.display()))?;
        let record: ControllerRecord =
            serde_json::from_str(&json).context("parsing checkpoint JSON")?;
        let controller = record
            .into_controller()
            .context("checkpoint failed validation")?;
        engine.seed_population(controller);
        tracing::info!(checkpoint = %path.display(), "resumed from checkpoint");
    }

    for _ in 0..args.generations {
        engine.run_generation()?;
    }

    let best = engine
        .best()
        .context("no generations were run, nothing to save")?;
    tracing::info!(
        fitness = best.fitness,
        score = best.score,
        generation = best.generation,
        "training finished"
    );

    let record = ControllerRecord::from_controller(&best.controller);
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(&args.out, json)
        .with_context(|| format!("writing checkpoint {}", args.out.display()))?;
    tracing::info!(path = %args.out.display(), "saved best controller");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_parser_accepts_x_comma_y() {
        assert_eq!(parse_coordinate("3,7").unwrap(), Coordinate::new(3, 7));
        assert_eq!(parse_coordinate(" 10 , 2 ").unwrap(), Coordinate::new(10, 2));
        assert!(parse_coordinate("10").is_err());
        assert!(parse_coordinate("a,b").is_err());
    }

    #[test]
    fn formula_parser_covers_both_variants() {
        assert_eq!(
            parse_formula("exponential-score").unwrap(),
            FitnessFormula::ExponentialScore
        );
        assert_eq!(
            parse_formula("score-driven").unwrap(),
            FitnessFormula::ScoreDriven
        );
        assert!(parse_formula("else").is_err());
    }

    #[test]
    fn cli_defaults_parse() {
        let args = Args::parse_from(["trainer"]);
        assert_eq!(args.population, 50);
        assert_eq!(args.seed, 42);
        assert_eq!(args.fitness, FitnessFormula::ExponentialScore);
    }
}
