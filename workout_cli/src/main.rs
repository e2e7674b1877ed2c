use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use workout_core::*;

#[derive(Parser)]
#[command(name = "repset")]
#[command(about = "Superset workout tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog exercises
    Catalog,

    /// Add a catalog exercise as a new superset
    Add {
        /// Catalog exercise id (see `repset catalog`)
        exercise_id: String,
    },

    /// Show the current workout (default)
    Show,

    /// Complete the next set of a superset
    Done {
        /// Superset number as shown by `repset show`
        superset: usize,
    },

    /// Edit a pending set of an exercise
    Edit {
        /// Exercise position as SUPERSET.EXERCISE, e.g. 1.2
        position: String,

        /// Set number, starting at 1
        set: usize,

        /// New target reps or seconds
        #[arg(long)]
        value: Option<f64>,

        /// New rest time in seconds
        #[arg(long)]
        rest: Option<u32>,

        /// New load for weighted exercises
        #[arg(long)]
        load: Option<f64>,
    },

    /// Append a set to an exercise
    AddSet {
        /// Exercise position as SUPERSET.EXERCISE, e.g. 1.2
        position: String,
    },

    /// Remove an exercise's last set
    RemoveSet {
        /// Exercise position as SUPERSET.EXERCISE, e.g. 1.2
        position: String,
    },

    /// Drag an exercise and release it
    Drag {
        /// Exercise position as SUPERSET.EXERCISE, e.g. 1.2
        position: String,

        /// Vertical travel
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        dy: f32,

        /// Horizontal travel
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        dx: f32,
    },

    /// Swipe an exercise sideways to remove it
    Swipe {
        /// Exercise position as SUPERSET.EXERCISE, e.g. 1.2
        position: String,

        /// Horizontal travel
        #[arg(long, allow_negative_numbers = true)]
        dx: f32,
    },

    /// Finish the workout and queue it in the outbox
    Finish,

    /// Print workouts waiting for upload, one JSON payload per line
    Pending,

    /// Mark queued workouts as uploaded
    Ack {
        /// Workout ids to acknowledge
        #[arg(required_unless_present = "all")]
        ids: Vec<Uuid>,

        /// Acknowledge every pending workout
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// Roll up finished workouts to CSV
    Rollup {
        /// Clean up processed outbox files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// Row height of the synthetic list layout used for drag commands
const ROW_HEIGHT: f32 = 100.0;
/// Vertical gap between superset containers
const SUPERSET_GAP: f32 = 200.0;
const ROW_WIDTH: f32 = 300.0;

struct Paths {
    store: PathBuf,
    outbox_dir: PathBuf,
    outbox: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        let outbox_dir = data_dir.join("outbox");
        Self {
            store: data_dir.join("session").join("supersets.json"),
            outbox: outbox_dir.join("completions.jsonl"),
            outbox_dir,
            csv: data_dir.join("history.csv"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    workout_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);

    let command = cli.command.unwrap_or(Commands::Show);
    match command {
        Commands::Catalog => cmd_catalog(),
        Commands::Pending => cmd_pending(&paths),
        Commands::Ack { ids, all } => cmd_ack(&paths, ids, all),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
        command => run_session_command(command, &paths, &config).await,
    }
}

async fn run_session_command(command: Commands, paths: &Paths, config: &Config) -> Result<()> {
    let store = Arc::new(JsonFileStore::new(&paths.store));
    let gateway = PersistenceGateway::spawn(store);
    let mut failures = gateway.subscribe_failures();
    let mut controller = SessionController::restore(gateway, config, Arc::new(LogCues)).await?;

    match command {
        Commands::Add { exercise_id } => cmd_add(&mut controller, &exercise_id)?,
        Commands::Show => cmd_show(&controller),
        Commands::Done { superset } => cmd_done(&mut controller, superset)?,
        Commands::Edit {
            position,
            set,
            value,
            rest,
            load,
        } => cmd_edit(&mut controller, &position, set, value, rest, load)?,
        Commands::AddSet { position } => cmd_add_set(&mut controller, &position)?,
        Commands::RemoveSet { position } => cmd_remove_set(&mut controller, &position)?,
        Commands::Drag { position, dy, dx } => {
            cmd_drag(&mut controller, &position, Offset::new(dx, dy))?
        }
        Commands::Swipe { position, dx } => {
            cmd_drag(&mut controller, &position, Offset::new(dx, 0.0))?
        }
        Commands::Finish => cmd_finish(&mut controller, paths)?,
        Commands::Catalog
        | Commands::Pending
        | Commands::Ack { .. }
        | Commands::Rollup { .. } => {}
    }

    controller.flush().await?;

    if let Ok(failure) = failures.try_recv() {
        eprintln!(
            "Failed to save superset {}: {}",
            failure.superset_id, failure.message
        );
        return Err(Error::Persistence(failure.message));
    }
    Ok(())
}

fn cmd_catalog() -> Result<()> {
    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    for exercise in catalog.sorted() {
        let unit = match exercise.measurement {
            Measurement::Reps => "reps",
            Measurement::Time => "time",
        };
        println!(
            "  {:<12} {:<20} {:<10} {}",
            exercise.id, exercise.title, exercise.muscle_group, unit
        );
    }
    Ok(())
}

fn cmd_add(controller: &mut SessionController, exercise_id: &str) -> Result<()> {
    let exercise = get_default_catalog()
        .get(exercise_id)
        .ok_or_else(|| Error::Session(format!("Unknown exercise: {}", exercise_id)))?;

    controller.add_exercise_from_catalog(exercise);
    println!(
        "✓ Added {} as superset {}",
        exercise.title,
        controller.supersets().len()
    );
    Ok(())
}

fn cmd_show(controller: &SessionController) {
    let supersets = controller.supersets();
    if supersets.is_empty() {
        println!("No exercises yet. Add one with `repset add <exercise>`.");
        return;
    }

    for (s, superset) in supersets.iter().enumerate() {
        let label = if superset.is_single_exercise() {
            "Exercise"
        } else {
            "Superset"
        };
        let status = if superset.is_done() { "  ✓ done" } else { "" };
        println!("{} {}{}", label, s + 1, status);

        for (e, exercise) in superset.exercises().iter().enumerate() {
            let marker = if !superset.is_done() && e == superset.current_exercise_index() {
                "→"
            } else {
                " "
            };
            println!(
                "  {} {}.{} {:<20} {}/{} sets",
                marker,
                s + 1,
                e + 1,
                exercise.exercise.title,
                exercise.sets_done(),
                exercise.set_count()
            );
        }
    }
}

fn cmd_done(controller: &mut SessionController, superset: usize) -> Result<()> {
    let superset_id = superset_at(controller, superset)?;
    let Some(outcome) = controller.complete_current_set(superset_id) else {
        println!("Nothing left to do in superset {}", superset);
        return Ok(());
    };

    let title = |id: Uuid| {
        controller
            .session()
            .exercise(id)
            .map(|e| e.exercise.title.clone())
            .unwrap_or_default()
    };
    if let Some(progress) = outcome.progress() {
        println!(
            "✓ {} set done, rest {}s",
            title(progress.exercise_id),
            progress.completed.rest_time_seconds
        );
    }
    if outcome.superset_completed() {
        println!("✓ Superset {} complete!", superset);
    } else if let Some(next) = outcome.progress().and_then(|p| p.next_exercise_id) {
        println!("  Next: {}", title(next));
    }
    Ok(())
}

fn cmd_edit(
    controller: &mut SessionController,
    position: &str,
    set: usize,
    value: Option<f64>,
    rest: Option<u32>,
    load: Option<f64>,
) -> Result<()> {
    if value.is_none() && rest.is_none() && load.is_none() {
        return Err(Error::Session(
            "Nothing to change, pass --value, --rest or --load".into(),
        ));
    }
    let (_, exercise_id) = exercise_at(controller, position)?;
    let exercise = controller
        .session()
        .exercise(exercise_id)
        .ok_or_else(|| Error::Session(format!("No exercise at {}", position)))?;
    let index = set
        .checked_sub(1)
        .filter(|&i| i < exercise.set_count())
        .ok_or_else(|| Error::Session(format!("No set {} at {}", set, position)))?;
    let set_id = exercise.active_sets()[index].id;
    let load_id = exercise.weight.get(index).map(|w| w.id);

    let mut edited = true;
    if value.is_some() || rest.is_some() {
        edited &= controller.edit_set(exercise_id, set_id, value, rest);
    }
    if load.is_some() {
        let load_id = load_id
            .ok_or_else(|| Error::Session(format!("{} is not a weighted exercise", position)))?;
        edited &= controller.edit_set(exercise_id, load_id, load, None);
    }
    if !edited {
        return Err(Error::Session(format!(
            "Set {} of {} is already completed",
            set, position
        )));
    }

    println!("✓ Updated set {} of {}", set, position);
    Ok(())
}

fn cmd_add_set(controller: &mut SessionController, position: &str) -> Result<()> {
    let (_, exercise_id) = exercise_at(controller, position)?;
    controller.add_set(exercise_id);
    let count = controller
        .session()
        .exercise(exercise_id)
        .map_or(0, |e| e.set_count());
    println!("✓ {} now has {} sets", position, count);
    Ok(())
}

fn cmd_remove_set(controller: &mut SessionController, position: &str) -> Result<()> {
    let (_, exercise_id) = exercise_at(controller, position)?;
    if !controller.remove_last_set(exercise_id) {
        return Err(Error::Session(format!("{} has a single set left", position)));
    }
    println!("✓ Removed the last set of {}", position);
    Ok(())
}

fn cmd_drag(controller: &mut SessionController, position: &str, offset: Offset) -> Result<()> {
    let (superset_id, exercise_id) = exercise_at(controller, position)?;
    lay_out(controller);

    let start = controller.handle_drag(DragEvent::Start {
        exercise_id,
        superset_id,
    });
    if start != DragOutcome::Started {
        return Err(Error::Session(format!("Cannot drag {}", position)));
    }
    controller.handle_drag(DragEvent::Move { offset });

    match controller.handle_drag(DragEvent::End { offset }) {
        DragOutcome::Dropped { decision } => match decision {
            DropDecision::MoveTo { .. } => {
                println!("✓ Moved {} into another superset", position)
            }
            DropDecision::Reorder { index } => {
                println!("✓ {} now at position {}", position, index + 1)
            }
            DropDecision::Promote => println!("✓ {} split into its own superset", position),
        },
        DragOutcome::Swiped {
            outcome: SwipeOutcome::Remove,
        } => println!("✓ Removed {}", position),
        DragOutcome::Swiped {
            outcome: SwipeOutcome::SnapBack,
        } => println!("  {} snapped back", position),
        other => tracing::warn!("Unexpected drag outcome {:?}", other),
    }
    Ok(())
}

fn cmd_finish(controller: &mut SessionController, paths: &Paths) -> Result<()> {
    if controller.supersets().is_empty() {
        println!("No workout in progress.");
        return Ok(());
    }

    let completion = controller.finish_workout();
    Outbox::new(&paths.outbox).queue(&completion)?;

    println!("✓ Workout finished: {} sets done", completion.sets_done());
    println!("  Queued for upload as {}", completion.id);
    Ok(())
}

fn cmd_pending(paths: &Paths) -> Result<()> {
    let pending = Outbox::new(&paths.outbox).pending()?;
    if pending.is_empty() {
        eprintln!("No workouts waiting for upload.");
        return Ok(());
    }
    for workout in pending {
        println!("{}", serde_json::to_string(&workout)?);
    }
    Ok(())
}

fn cmd_ack(paths: &Paths, ids: Vec<Uuid>, all: bool) -> Result<()> {
    let outbox = Outbox::new(&paths.outbox);
    let ids = if all {
        outbox.pending()?.into_iter().map(|w| w.id).collect()
    } else {
        ids
    };

    let mut acknowledged = 0;
    for id in ids {
        if outbox.mark_uploaded(id)? {
            acknowledged += 1;
        } else {
            eprintln!("Workout {} is not waiting for upload", id);
        }
    }
    println!("✓ Marked {} workouts uploaded", acknowledged);
    Ok(())
}

fn cmd_rollup(paths: &Paths, cleanup: bool) -> Result<()> {
    if !paths.outbox.exists() {
        println!("No outbox file found - nothing to roll up.");
        return Ok(());
    }

    let count = workout_core::csv_rollup::outbox_to_csv_and_archive(&paths.outbox, &paths.csv)?;

    println!("✓ Rolled up {} workouts to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    let waiting = Outbox::new(&paths.outbox).pending()?.len();
    if waiting > 0 {
        println!("  {} workouts still waiting for upload", waiting);
    }

    if cleanup {
        let cleaned = workout_core::csv_rollup::cleanup_processed_outboxes(&paths.outbox_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed outbox files", cleaned);
        }
    }

    Ok(())
}

/// Stack supersets top to bottom the way the list renders them
fn lay_out(controller: &mut SessionController) {
    let mut y = 0.0;
    let supersets = controller.supersets().to_vec();
    for superset in supersets {
        let top = y;
        for exercise in superset.exercises() {
            let rect = Rect::new(0.0, y, ROW_WIDTH, y + ROW_HEIGHT);
            controller.observe_exercise_box(exercise.id, rect);
            y += ROW_HEIGHT;
        }
        controller.observe_superset_box(superset.id(), Rect::new(0.0, top, ROW_WIDTH, y));
        y += SUPERSET_GAP;
    }
}

fn superset_at(controller: &SessionController, number: usize) -> Result<Uuid> {
    number
        .checked_sub(1)
        .and_then(|i| controller.supersets().get(i))
        .map(|s| s.id())
        .ok_or_else(|| Error::Session(format!("No superset {}", number)))
}

fn exercise_at(controller: &SessionController, position: &str) -> Result<(Uuid, Uuid)> {
    let invalid = || Error::Session(format!("Invalid position: {}", position));
    let (s, e) = position.split_once('.').ok_or_else(invalid)?;
    let s: usize = s.parse().map_err(|_| invalid())?;
    let e: usize = e.parse().map_err(|_| invalid())?;

    let superset_id = superset_at(controller, s)?;
    let exercise_id = e
        .checked_sub(1)
        .and_then(|i| controller.supersets()[s - 1].exercises().get(i))
        .map(|x| x.id)
        .ok_or_else(invalid)?;
    Ok((superset_id, exercise_id))
}
