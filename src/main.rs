//! fitcycle - Interval workout timer and weekly training planner

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fitcycle::db::Database;
use fitcycle::plans::{CyclePlan, Exercise, WorkoutPlan, day_name, format_duration, parse_weekday};
use fitcycle::settings::{Settings, SoundAssets, TerminalFeedback};
use fitcycle::store::{CyclePlanUpdate, NewCyclePlan, NewWorkoutPlan, PlanStore, WorkoutPlanUpdate};
use fitcycle::timer::{Session, spawn_session};
use fitcycle::tui::{App, Theme};

#[derive(Parser)]
#[command(name = "fitcycle")]
#[command(author, version, about = "Interval workout timer and weekly training planner")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "FITCYCLE_DB", default_value = "fitcycle.db", global = true)]
    db: PathBuf,

    /// Directory searched for sound assets
    #[arg(long, env = "FITCYCLE_ASSETS", default_value = ".", global = true)]
    assets: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI dashboard
    Tui,

    /// Run a workout (today's plan when no id is given)
    Run {
        /// Workout plan id
        plan_id: Option<String>,
    },

    /// Manage workout plans
    Plan {
        #[command(subcommand)]
        action: PlanCommand,
    },

    /// Manage weekly cycles
    Cycle {
        #[command(subcommand)]
        action: CycleCommand,
    },

    /// Show today's scheduled workout
    Today,

    /// List workout history
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only records of this plan
        #[arg(short, long)]
        plan: Option<String>,
    },

    /// Record a finished workout manually
    Log {
        /// Workout plan id
        plan_id: String,

        /// Active time in seconds
        duration: u32,
    },

    /// Export all data to a dated JSON file
    Export {
        /// Target directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Import data from an exported JSON file
    Import {
        /// Export file
        file: PathBuf,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsCommand>,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Add a workout plan
    Add {
        /// Plan name
        name: String,

        /// Workout type (push, pull, legs, chest, back, shoulders, arms, custom)
        #[arg(short = 't', long = "type", default_value = "custom")]
        workout_type: String,

        /// Exercise as name:sets[:seconds[:rest[:note]]], repeatable
        #[arg(short, long = "exercise", required = true)]
        exercises: Vec<String>,
    },

    /// List workout plans
    List,

    /// Show one plan with its exercises
    Show { id: String },

    /// Change a workout plan
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short = 't', long = "type")]
        workout_type: Option<String>,

        /// Replaces all exercises when given
        #[arg(short, long = "exercise")]
        exercises: Vec<String>,
    },

    /// Delete a plan and remove it from every cycle
    Delete { id: String },
}

#[derive(Subcommand)]
enum CycleCommand {
    /// Add a weekly cycle
    Add {
        /// Cycle name
        name: String,

        /// Cycle type (three-split, five-split, custom)
        #[arg(short = 't', long = "type", default_value = "custom")]
        cycle_type: String,

        /// Plan id included in the cycle, repeatable
        #[arg(short, long = "plan")]
        plans: Vec<String>,

        /// Schedule entry DAY=PLAN_ID (day 0-6 from Sunday, or a name), repeatable
        #[arg(short, long = "day")]
        days: Vec<String>,

        /// Make this the active cycle
        #[arg(short, long)]
        active: bool,
    },

    /// List cycles with their schedule
    List,

    /// Make a cycle the active one
    Activate { id: String },

    /// Change a cycle's name or schedule
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        /// Replaces the schedule when given
        #[arg(short, long = "day")]
        days: Vec<String>,
    },

    /// Delete a cycle
    Delete { id: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print current settings
    Show,

    /// Change settings
    Set {
        #[arg(long)]
        sound: Option<bool>,

        #[arg(long)]
        vibration: Option<bool>,

        /// Default seconds per set
        #[arg(long)]
        exercise_time: Option<u32>,

        /// Default rest seconds between sets
        #[arg(long)]
        rest_time: Option<u32>,

        /// Accent color as #rrggbb
        #[arg(long)]
        theme: Option<String>,

        #[arg(long)]
        dark: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    let db = Database::open(&cli.db)?;
    let mut store = PlanStore::open(db);

    match cli.command {
        None | Some(Commands::Tui) => run_tui(store, &cli.assets, None).await?,

        Some(Commands::Run { plan_id }) => {
            let plan_id = match plan_id {
                Some(id) => id,
                None => store
                    .today_workout_plan()
                    .map(|p| p.id.clone())
                    .ok_or_else(|| anyhow!("No workout scheduled for today"))?,
            };
            if store.find_plan(&plan_id).is_none() {
                bail!("Unknown workout plan: {}", plan_id);
            }
            run_tui(store, &cli.assets, Some(plan_id)).await?;
        }

        Some(Commands::Plan { action }) => plan_command(&mut store, action)?,

        Some(Commands::Cycle { action }) => cycle_command(&mut store, action)?,

        Some(Commands::Today) => {
            let today = chrono::Local::now().date_naive();
            match (store.active_cycle_plan(), store.today_workout_plan()) {
                (None, _) => println!("No active cycle"),
                (Some(cycle), None) => {
                    println!("{} ({}): rest day", today.format("%A"), cycle.name)
                }
                (Some(cycle), Some(plan)) => {
                    println!("{} ({}):", today.format("%A"), cycle.name);
                    print_plan(plan);
                }
            }
        }

        Some(Commands::History { limit, plan }) => {
            let records: Vec<_> = match &plan {
                Some(id) => {
                    let mut records: Vec<_> = store.records_for_plan(id).collect();
                    records.reverse();
                    records.truncate(limit);
                    records
                }
                None => store.recent_records(limit),
            };
            println!("Recent workouts:");
            println!("{:-<60}", "");
            for r in records {
                let name = store
                    .find_plan(&r.plan_id)
                    .map_or("(deleted plan)", |p| p.name.as_str());
                println!(
                    "{} | {:24} | {}",
                    r.date.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                    name,
                    format_duration(r.duration)
                );
            }
        }

        Some(Commands::Log { plan_id, duration }) => {
            let record = store.record_workout(&plan_id, duration)?;
            println!("Logged: {} - {} (id: {})", plan_id, format_duration(duration), record.id);
        }

        Some(Commands::Export { dir }) => {
            let path = store.export_to_dir(&dir)?;
            println!("Exported to {}", path.display());
        }

        Some(Commands::Import { file }) => {
            let summary = store.import_file(&file)?;
            let count = |n: Option<usize>| n.map_or("unchanged".to_string(), |n| n.to_string());
            println!(
                "Imported plans: {}, cycles: {}, records: {}",
                count(summary.plans),
                count(summary.cycles),
                count(summary.records)
            );
            if summary.dropped_references > 0 {
                println!("Dropped {} references to missing plans", summary.dropped_references);
            }
        }

        Some(Commands::Settings { action }) => settings_command(&store, action)?,
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    // Logs would tear the alternate screen, keep the TUI quiet unless asked
    let interactive = matches!(
        cli.command,
        None | Some(Commands::Tui) | Some(Commands::Run { .. })
    );
    let level = match (cli.verbose, interactive) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(
    store: PlanStore,
    assets: &std::path::Path,
    plan_id: Option<String>,
) -> Result<()> {
    let settings = Settings::load(store.database());
    let feedback = TerminalFeedback::new(&settings, SoundAssets::new(assets));
    let store = Arc::new(Mutex::new(store));
    let (handle, task) = spawn_session(Session::new(feedback, Arc::clone(&store)));
    let theme = Theme::from(&settings);

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut app = App::new(store, handle, theme)?;
        if let Some(id) = plan_id {
            app.start_workout(&id)?;
        }
        app.run()
    })
    .await
    .context("TUI thread panicked")??;

    // The app owned the last handle, so the session winds down on its own
    task.await.context("workout session task failed")?;
    info!("Session closed");
    Ok(())
}

fn plan_command(store: &mut PlanStore, action: PlanCommand) -> Result<()> {
    let defaults = Settings::load(store.database()).default_settings;
    let parse_exercises = |specs: &[String]| -> Result<Vec<Exercise>> {
        specs
            .iter()
            .map(|s| Exercise::parse_spec(s, defaults.exercise_time, defaults.rest_time))
            .collect()
    };

    match action {
        PlanCommand::Add { name, workout_type, exercises } => {
            let plan = store.add_workout_plan(NewWorkoutPlan {
                name,
                workout_type: workout_type.parse()?,
                exercises: parse_exercises(&exercises)?,
            })?;
            println!("Added plan: {} (id: {})", plan.name, plan.id);
        }

        PlanCommand::List => {
            println!("Workout plans:");
            println!("{:-<70}", "");
            for p in store.workout_plans() {
                println!(
                    "{:16} | {} {:24} | {:2} exercises | {}",
                    p.id,
                    p.workout_type.emoji(),
                    p.name,
                    p.exercises.len(),
                    format_duration(p.estimated_duration())
                );
            }
        }

        PlanCommand::Show { id } => {
            let plan = store.find_plan(&id).ok_or_else(|| anyhow!("Unknown workout plan: {}", id))?;
            print_plan(plan);
        }

        PlanCommand::Update { id, name, workout_type, exercises } => {
            let update = WorkoutPlanUpdate {
                name,
                workout_type: workout_type.map(|t| t.parse()).transpose()?,
                exercises: if exercises.is_empty() {
                    None
                } else {
                    Some(parse_exercises(&exercises)?)
                },
            };
            match store.update_workout_plan(&id, update)? {
                Some(plan) => println!("Updated plan: {}", plan.name),
                None => bail!("Unknown workout plan: {}", id),
            }
        }

        PlanCommand::Delete { id } => {
            if !store.delete_workout_plan(&id)? {
                bail!("Unknown workout plan: {}", id);
            }
            println!("Deleted plan {}", id);
        }
    }
    Ok(())
}

fn cycle_command(store: &mut PlanStore, action: CycleCommand) -> Result<()> {
    match action {
        CycleCommand::Add { name, cycle_type, plans, days, active } => {
            let cycle = store.add_cycle_plan(NewCyclePlan {
                name,
                cycle_type: cycle_type.parse()?,
                workout_plans: plans,
                schedule: parse_schedule(&days)?,
                active,
            })?;
            println!("Added cycle: {} (id: {})", cycle.name, cycle.id);
        }

        CycleCommand::List => {
            for c in store.cycle_plans() {
                print_cycle(store, c);
            }
        }

        CycleCommand::Activate { id } => {
            if !store.activate_cycle(&id)? {
                bail!("Unknown cycle: {}", id);
            }
            println!("Activated cycle {}", id);
        }

        CycleCommand::Update { id, name, days } => {
            let update = CyclePlanUpdate {
                name,
                schedule: if days.is_empty() { None } else { Some(parse_schedule(&days)?) },
                ..Default::default()
            };
            match store.update_cycle_plan(&id, update)? {
                Some(cycle) => println!("Updated cycle: {}", cycle.name),
                None => bail!("Unknown cycle: {}", id),
            }
        }

        CycleCommand::Delete { id } => {
            if !store.delete_cycle_plan(&id)? {
                bail!("Unknown cycle: {}", id);
            }
            println!("Deleted cycle {}", id);
        }
    }
    Ok(())
}

fn settings_command(store: &PlanStore, action: Option<SettingsCommand>) -> Result<()> {
    let mut settings = Settings::load(store.database());

    if let Some(SettingsCommand::Set {
        sound,
        vibration,
        exercise_time,
        rest_time,
        theme,
        dark,
    }) = action
    {
        if let Some(v) = sound {
            settings.sound_enabled = v;
        }
        if let Some(v) = vibration {
            settings.vibration_enabled = v;
        }
        if let Some(v) = exercise_time {
            settings.default_settings.exercise_time = v;
        }
        if let Some(v) = rest_time {
            settings.default_settings.rest_time = v;
        }
        if let Some(color) = theme {
            settings.set_theme_color(&color)?;
        }
        if let Some(v) = dark {
            settings.is_dark_mode = v;
        }
        settings.save(store.database())?;
        println!("Settings saved");
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Parse `DAY=PLAN_ID` pairs
fn parse_schedule(entries: &[String]) -> Result<BTreeMap<u8, String>> {
    entries
        .iter()
        .map(|entry| {
            let (day, plan) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("schedule entry must be DAY=PLAN_ID, got '{}'", entry))?;
            Ok((parse_weekday(day)?, plan.trim().to_string()))
        })
        .collect()
}

fn print_plan(plan: &WorkoutPlan) {
    println!(
        "{} {} [{}] (id: {})",
        plan.workout_type.emoji(),
        plan.name,
        plan.workout_type,
        plan.id
    );
    println!("{:-<60}", "");
    for (i, e) in plan.exercises.iter().enumerate() {
        println!(
            "{:2}. {:20} {} x {}s, rest {}s{}",
            i + 1,
            e.name,
            e.sets,
            e.time_per_set,
            e.rest_between_sets,
            e.note.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default()
        );
    }
    println!(
        "Estimated: {} ({} active)",
        format_duration(plan.estimated_duration()),
        format_duration(plan.active_duration())
    );
}

fn print_cycle(store: &PlanStore, cycle: &CyclePlan) {
    let marker = if cycle.active { " *active*" } else { "" };
    println!("{} [{}] (id: {}){}", cycle.name, cycle.cycle_type, cycle.id, marker);
    for (day, plan_id) in &cycle.schedule {
        let name = store.find_plan(plan_id).map_or(plan_id.as_str(), |p| p.name.as_str());
        println!("  {:9} {}", day_name(*day), name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schedule() {
        let schedule = parse_schedule(&["1=a".to_string(), "fri=b".to_string()]).unwrap();
        assert_eq!(schedule.get(&1).map(String::as_str), Some("a"));
        assert_eq!(schedule.get(&5).map(String::as_str), Some("b"));
        assert!(parse_schedule(&["monday".to_string()]).is_err());
        assert!(parse_schedule(&["9=a".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_plan_add() {
        let cli = Cli::try_parse_from([
            "fitcycle",
            "--db",
            "x.db",
            "plan",
            "add",
            "Push day",
            "-t",
            "push",
            "-e",
            "bench:3",
            "-e",
            "dips:3:30:20",
        ])
        .unwrap();
        assert_eq!(cli.db, PathBuf::from("x.db"));
        match cli.command {
            Some(Commands::Plan { action: PlanCommand::Add { name, workout_type, exercises } }) => {
                assert_eq!(name, "Push day");
                assert_eq!(workout_type, "push");
                assert_eq!(exercises.len(), 2);
            }
            _ => panic!("expected plan add"),
        }
    }
}
