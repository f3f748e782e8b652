use clap::{Args, Parser, Subcommand};
use fitcrew_core::config::DataConfig;
use fitcrew_core::gather::select_collaborators;
use fitcrew_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fitcrew")]
#[command(about = "Duration-exact workout generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a complete workout
    Generate {
        #[command(flatten)]
        request: RequestArgs,

        /// Print the workout as JSON
        #[arg(long)]
        json: bool,

        /// Append the workout to the saved workouts log
        #[arg(long)]
        save: bool,

        /// Do not fall back to the built-in exercise library
        #[arg(long)]
        no_library: bool,
    },

    /// Print the macro plan for a request as JSON
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// List the collaborators a request would consult
    Agents {
        #[command(flatten)]
        request: RequestArgs,
    },
}

#[derive(Args, Clone, Debug)]
struct RequestArgs {
    /// Session length in minutes (5-120)
    #[arg(long)]
    minutes: u32,

    /// Workout type (strength, cardio, mixed, flexibility, hiit)
    #[arg(long = "type", value_name = "TYPE")]
    workout_type: WorkoutType,

    /// Difficulty (beginner, intermediate, advanced)
    #[arg(long, default_value = "intermediate")]
    difficulty: Difficulty,

    /// Focus area, repeatable or comma separated
    #[arg(long = "focus", value_delimiter = ',')]
    focus: Vec<String>,

    /// Special requirement such as low_impact, repeatable
    #[arg(long = "require", value_delimiter = ',')]
    require: Vec<String>,

    /// Available equipment; defaults to the configured list
    #[arg(long = "equipment", value_delimiter = ',')]
    equipment: Vec<String>,

    /// Training experience (beginner, intermediate, advanced)
    #[arg(long)]
    experience: Option<Difficulty>,

    /// Training goal, repeatable
    #[arg(long = "goal", value_delimiter = ',')]
    goals: Vec<String>,

    /// JSON file of recorded collaborator responses
    #[arg(long)]
    fixtures: Option<PathBuf>,
}

impl RequestArgs {
    fn to_request(&self, config: &Config) -> GenerationRequest {
        let available_equipment = if self.equipment.is_empty() {
            config.equipment.available.clone()
        } else {
            self.equipment.clone()
        };

        GenerationRequest {
            workout_type: self.workout_type,
            duration_minutes: self.minutes,
            difficulty: self.difficulty,
            focus_areas: self.focus.clone(),
            special_requirements: self.require.iter().map(|r| canonical_tag(r)).collect(),
            user_context: UserContext {
                available_equipment,
                experience_level: self.experience.unwrap_or(self.difficulty),
                goals: self.goals.iter().map(|g| canonical_tag(g)).collect(),
                ..Default::default()
            },
        }
    }

    fn collaborators(&self) -> Result<CollaboratorSet> {
        match &self.fixtures {
            Some(path) => load_fixture_collaborators(path),
            None => Ok(CollaboratorSet::new()),
        }
    }
}

#[tokio::main]
async fn main() {
    fitcrew_core::logging::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data = DataConfig {
        data_dir: cli
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data.data_dir.clone()),
    };
    tracing::debug!("Using data directory {:?}", data.data_dir);

    match cli.command {
        Commands::Generate {
            request,
            json,
            save,
            no_library,
        } => cmd_generate(&request, json, save, no_library, &config, &data).await,
        Commands::Plan { request } => cmd_plan(&request, &config).await,
        Commands::Agents { request } => cmd_agents(&request, &config),
    }
}

async fn cmd_generate(
    args: &RequestArgs,
    json: bool,
    save: bool,
    no_library: bool,
    config: &Config,
    data: &DataConfig,
) -> Result<()> {
    let mut settings = config.generation.clone();
    if no_library {
        settings.use_builtin_library = false;
    }

    let request = args.to_request(config);
    let orchestrator = Orchestrator::new(args.collaborators()?, settings);
    let workout = orchestrator.generate(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workout)?);
    } else {
        display_workout(&workout);
    }

    if save {
        let path = data.workouts_path();
        let mut sink = JsonlSink::new(&path);
        sink.append(&workout)?;
        if json {
            eprintln!("Saved workout to {}", path.display());
        } else {
            println!("✓ Saved workout to {}", path.display());
        }
    }

    Ok(())
}

async fn cmd_plan(args: &RequestArgs, config: &Config) -> Result<()> {
    let request = args.to_request(config);
    request.validate()?;

    let collaborators = args.collaborators()?;
    let (plan, _) = planner::plan(&request, &collaborators, &config.generation).await;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_agents(args: &RequestArgs, config: &Config) -> Result<()> {
    let request = args.to_request(config);
    request.validate()?;

    let collaborators = args.collaborators()?;
    let status = |kind: CollaboratorKind| {
        if collaborators.contains(kind) {
            "available"
        } else {
            "unavailable"
        }
    };

    println!("Planning:");
    println!(
        "  {:<22} {}",
        CollaboratorKind::ProgramDirector.as_str(),
        status(CollaboratorKind::ProgramDirector)
    );
    println!("Specialists:");
    for kind in select_collaborators(&request) {
        println!("  {:<22} {}", kind.as_str(), status(kind));
    }
    println!("Integration:");
    println!(
        "  {:<22} {}",
        CollaboratorKind::GeneralCoach.as_str(),
        status(CollaboratorKind::GeneralCoach)
    );
    Ok(())
}

fn display_workout(workout: &FinalWorkout) {
    let breakdown = &workout.phase_duration_breakdown;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", workout.name.to_uppercase());
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", workout.summary);
    println!(
        "  Difficulty: {}   Total: {} ({} s)   ~{} kcal",
        workout.difficulty,
        clock(workout.total_estimated_duration_seconds),
        workout.total_estimated_duration_seconds,
        workout.estimated_calories
    );
    println!(
        "  Equipment: {}",
        workout
            .equipment_needed
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );

    println!("\n  Warm-up ({})", clock(breakdown.warmup));
    for item in &workout.warmup {
        println!("    {:>6}  {}", clock(item.duration_seconds), item.name);
    }

    println!("\n  Main ({})", clock(breakdown.main));
    for exercise in &workout.main {
        let target = match exercise.target {
            SetTarget::Reps(reps) => format!("{} x {} reps", exercise.sets, reps),
            SetTarget::WorkSeconds(work) => format!("{} x {}s", exercise.sets, work),
        };
        println!(
            "    {:>6}  {}  ({}, rest {}s)",
            clock(exercise.block_duration_seconds),
            exercise.name,
            target,
            exercise.rest_seconds
        );
    }

    println!("\n  Cool-down ({})", clock(breakdown.cooldown));
    for item in &workout.cooldown {
        println!("    {:>6}  {}", clock(item.duration_seconds), item.name);
    }

    if !workout.safety_notes.is_empty() {
        println!("\n  Safety:");
        for note in &workout.safety_notes {
            println!("    ⚠ {}", note);
        }
    }

    if !workout.modifications.is_empty() {
        println!("\n  Modifications:");
        for (exercise, options) in &workout.modifications {
            for option in options {
                println!("    {}: {}", exercise, option.description);
            }
        }
    }

    println!();
}

/// Seconds as m:ss
fn clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
