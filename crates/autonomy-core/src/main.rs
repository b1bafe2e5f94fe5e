//! Autonomy Simulator
//!
//! Loads a scenario, runs one autonomy pass (or a mixer pick) for an actor
//! tick by tick, and prints what it chose.

use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process::ExitCode;

use autonomy_core::{
    AutonomyConfig, AutonomyRequest, Collaborators, DiagnosticsSink, EvaluationPass, JsonlSink,
    MixerSelector, MotiveScope, MotiveScoreTable, NullSink, ObjectId, PassOutcome, PassPoll, ScenarioRuntime,
    ScenarioSpec, ScenarioWorld, WorldModel,
};

/// Command line arguments for the simulator
#[derive(Parser, Debug)]
#[command(name = "autonomy_sim")]
#[command(about = "Runs utility-based action selection against a scenario")]
struct Args {
    /// Scenario TOML file
    #[arg(long)]
    scenario: PathBuf,

    /// Engine configuration TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Actor to decide for (defaults to the first actor in the scenario)
    #[arg(long)]
    actor: Option<String>,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Directory for candidates.jsonl and passes.jsonl
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Pick a mixer instead of running a full pass
    #[arg(long)]
    mixer: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let spec = ScenarioSpec::from_file(&args.scenario).map_err(|e| e.to_string())?;
    let world = spec.build().map_err(|e| e.to_string())?;
    let config = match &args.config {
        Some(path) => AutonomyConfig::from_file(path).map_err(|e| e.to_string())?,
        None => AutonomyConfig::default(),
    };

    let actor_name = match &args.actor {
        Some(name) => name.clone(),
        None => spec
            .actors
            .first()
            .map(|a| a.name.clone())
            .ok_or("scenario has no actors")?,
    };
    let actor = world
        .lookup(&actor_name)
        .filter(|id| world.actor(*id).is_some())
        .ok_or_else(|| format!("no actor named {}", actor_name))?;

    println!("Autonomy Simulator");
    println!("==================");
    println!("Scenario: {}", args.scenario.display());
    println!("Actor: {} ({})", actor_name, actor);
    println!("Seed: {}", args.seed);
    println!();

    if args.mixer {
        return pick_mixer(&world, &config, actor, args.seed);
    }

    let mut jsonl = match &args.diagnostics {
        Some(dir) => Some(JsonlSink::new(dir).map_err(|e| e.to_string())?),
        None => None,
    };
    let mut null = NullSink;
    let sink: &mut dyn DiagnosticsSink = match jsonl.as_mut() {
        Some(jsonl) => jsonl,
        None => &mut null,
    };
    let mut runtime = ScenarioRuntime::new();
    let request = AutonomyRequest::new(actor).with_seed(args.seed);
    let mut pass = EvaluationPass::new(config, request);

    let mut tick = 0u64;
    let outcome = loop {
        let mut collab = Collaborators::new(&world, &world, &world, &mut runtime, &mut *sink);
        match pass.step(&mut collab).map_err(|e| e.to_string())? {
            PassPoll::Yield(kind) => {
                tick += 1;
                println!("  tick {}: yielded ({:?})", tick, kind);
            }
            PassPoll::Done(outcome) => break outcome,
        }
    };

    match outcome {
        PassOutcome::Winners(result) => {
            println!("Winners ({}, {} round(s)):", result.tier, result.rounds);
            for winner in &result.winners {
                println!(
                    "  {:<20} -> {:<12} score {:>8.3}  route {:>6.2}  multitask {:.2}",
                    winner.candidate.action_id(),
                    world.name_of(winner.action.target).unwrap_or("?"),
                    winner.score,
                    winner.route_time,
                    winner.multitask_percentage
                );
            }
            if let Some(best) = result.best() {
                println!("Best: {}", best.candidate.action_id());
            }
            result.release(&mut runtime);
        }
        PassOutcome::NoResult(reason) => println!("No result: {:?}", reason),
        PassOutcome::Aborted => println!("Pass aborted"),
    }

    if let Some(jsonl) = jsonl.as_mut() {
        jsonl.flush().map_err(|e| e.to_string())?;
        println!(
            "Diagnostics: {} record(s) written to {}",
            jsonl.lines_written(),
            jsonl.output_dir().display()
        );
    }
    Ok(())
}

fn pick_mixer(world: &ScenarioWorld, config: &AutonomyConfig, actor: ObjectId, seed: u64) -> Result<(), String> {
    let state = world.actor(actor).ok_or("actor vanished")?;
    let motives = MotiveScoreTable::snapshot(&state.motives, &MotiveScope::Default);
    let providers = world.mixer_providers(actor);
    let mut rng = SmallRng::seed_from_u64(seed);

    match MixerSelector::new(config, &motives).select(&providers, &mut rng) {
        Some(choice) => {
            println!("Mixer provider: {}", choice.provider);
            println!("Group: {}", choice.group);
            for (action, score) in &choice.actions {
                println!("  {:<20} score {:>8.3}", action, score);
            }
        }
        None => println!("No mixer available"),
    }
    Ok(())
}
