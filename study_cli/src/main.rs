use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use study_core::catalog::Catalog;
use study_core::*;

#[derive(Parser)]
#[command(name = "devo")]
#[command(about = "Daily devotional study companion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, hide = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's challenge (default)
    Today,

    /// Work through today's challenge
    Challenge {
        #[command(flatten)]
        action: StepAction,
    },

    /// Work through any study unit
    Study {
        /// Unit identifier
        unit_id: String,

        #[command(flatten)]
        action: StepAction,
    },

    /// List recently studied units
    Recent,

    /// List available study units
    List {
        /// Only units in this category
        #[arg(long)]
        category: Option<String>,

        /// Only units whose title contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Forget stored progress for a unit
    Reset {
        /// Unit identifier
        unit_id: String,

        /// Reset the daily challenge progress instead of study history
        #[arg(long)]
        challenge: bool,
    },
}

#[derive(Args)]
struct StepAction {
    /// Complete the active step
    #[arg(long, conflicts_with = "complete")]
    next: bool,

    /// Complete the named step
    #[arg(long, value_name = "STEP")]
    complete: Option<String>,
}

/// Collaborators shared by every command
struct App {
    config: Config,
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    content: Arc<dyn ContentSource>,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(ref dir) = cli.data_dir {
            config.data.data_dir = dir.clone();
        }

        let clock: Arc<dyn Clock> = match cli.today {
            Some(day) => Arc::new(FixedClock::new(day)),
            None => Arc::new(SystemClock),
        };

        let content: Arc<dyn ContentSource> = match config.content.catalog_path {
            Some(ref path) => Arc::new(Catalog::load_from(path)?),
            None => Arc::new(get_default_catalog().clone()),
        };

        let kv: Arc<dyn KeyValueStore> = Arc::new(FileKvStore::new(config.store_path()));

        Ok(Self {
            config,
            kv,
            clock,
            content,
        })
    }

    fn daily_cache(&self) -> DailyContentCache {
        DailyContentCache::new(
            Arc::clone(&self.kv),
            Arc::clone(&self.content),
            Arc::clone(&self.clock),
        )
        .with_fallback_title(self.config.challenge.fallback_title.clone())
    }

    fn store(&self, namespace: &str) -> ProgressStore {
        ProgressStore::new(Arc::clone(&self.kv), Arc::clone(&self.clock), namespace)
    }
}

fn main() {
    // Initialize logging
    study_core::logging::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let app = App::new(&cli)?;

    match cli.command {
        Some(Commands::Today) | None => cmd_today(&app),
        Some(Commands::Challenge { action }) => cmd_challenge(&app, &action),
        Some(Commands::Study { unit_id, action }) => cmd_study(&app, &unit_id, &action),
        Some(Commands::Recent) => cmd_recent(&app),
        Some(Commands::List { category, search }) => cmd_list(&app, category, search),
        Some(Commands::Reset { unit_id, challenge }) => cmd_reset(&app, &unit_id, challenge),
    }
}

fn cmd_today(app: &App) -> Result<()> {
    let cache = app.daily_cache();
    let today = cache.get_todays_unit();
    let session = StudySession::open(today.unit().clone(), cache.challenge_progress().clone());

    println!("\nToday's challenge ({})", today.source());
    display_session(&session);

    if today.is_fallback() {
        println!("  Content is unavailable right now. Try again later.");
    }
    Ok(())
}

fn cmd_challenge(app: &App, action: &StepAction) -> Result<()> {
    let cache = app.daily_cache();
    let today = cache.get_todays_unit();
    if today.is_fallback() {
        println!("Content is unavailable, progress on this challenge will not be saved.");
    }

    let session = StudySession::open(today.into_unit(), cache.challenge_progress().clone());
    run_session(session, action)
}

fn cmd_study(app: &App, unit_id: &str, action: &StepAction) -> Result<()> {
    let unit = app.content.fetch_unit_by_id(&UnitId::new(unit_id))?;
    let session = StudySession::open(unit, app.store(STUDY_NAMESPACE));
    run_session(session, action)
}

fn cmd_recent(app: &App) -> Result<()> {
    let store = app.store(STUDY_NAMESPACE);
    let recent = store.recently_engaged(app.config.study.recent_limit);

    if recent.is_empty() {
        println!("Nothing studied yet. Try `devo study <unit>`.");
        return Ok(());
    }

    println!("\nContinue reading:");
    for (id, record) in recent {
        match app.content.fetch_unit_by_id(&id) {
            Ok(unit) => {
                let pct = percent(record.completed_steps.len(), unit.steps.len());
                let next = record
                    .current_step
                    .as_ref()
                    .map(|s| format!("next: {}", s))
                    .unwrap_or_else(|| "complete".to_string());
                println!("  [{}] {} - {}% ({})", id, unit.title, pct, next);
            }
            Err(e) => {
                tracing::warn!("Unable to fetch unit {}: {}", id, e);
                println!(
                    "  [{}] {} steps completed",
                    id,
                    record.completed_steps.len()
                );
            }
        }
    }
    Ok(())
}

fn cmd_list(app: &App, category: Option<String>, search: Option<String>) -> Result<()> {
    let filter = UnitFilter { category, search };
    let units = app.content.fetch_unit_list(Some(&filter))?;

    if units.is_empty() {
        println!("No study units found.");
        return Ok(());
    }

    for unit in units {
        let id = unit.id.map(|id| id.to_string()).unwrap_or_default();
        println!("  [{}] {} ({})", id, unit.title, unit.category);
    }
    Ok(())
}

fn cmd_reset(app: &App, unit_id: &str, challenge: bool) -> Result<()> {
    let namespace = if challenge {
        CHALLENGE_NAMESPACE
    } else {
        STUDY_NAMESPACE
    };
    app.store(namespace).clear(&UnitId::new(unit_id));
    println!("✓ Progress cleared for {}", unit_id);
    Ok(())
}

fn run_session(mut session: StudySession, action: &StepAction) -> Result<()> {
    session.on_progress_update(|pct| tracing::info!("Progress updated: {}%", pct));

    let completion = if action.next {
        Some(session.complete_active()?)
    } else if let Some(ref step) = action.complete {
        Some(session.complete(&StepId::new(step.as_str()))?)
    } else {
        None
    };

    if let Some(completion) = completion {
        println!(
            "\n✓ Completed '{}' ({}%)",
            completion.step,
            session.percent()
        );
        if completion.unit_completed {
            println!("🎉 Study complete! Well done.");
        }
    }

    display_session(&session);
    Ok(())
}

fn display_session(session: &StudySession) {
    let unit = session.unit();

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", unit.title);
    println!("╰─────────────────────────────────────────╯");
    if !unit.category.is_empty() {
        println!("  Category: {}", unit.category);
    }
    if let Some(ref reference) = unit.reference {
        println!("  Reference: {}", reference);
    }
    println!("  Progress: {}%", session.percent());
    println!();

    for (step_id, state) in session.snapshot() {
        let marker = match state {
            StepState::Completed => "[x]",
            StepState::Unlocked => "[>]",
            StepState::Locked => "[ ]",
        };
        let title = unit
            .step(&step_id)
            .map(|s| s.title.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(step_id.as_str());
        println!("  {} {} ({})", marker, title, step_id);
    }
    println!();
}
