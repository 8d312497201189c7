use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stevedore",
    about = "Stevedore — declarative service scheduler",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to the coordination store (falls back to $STEVEDORE_STORE,
    /// then ./stevedore.redb)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect pod instances and their tasks
    Pod {
        #[command(subcommand)]
        action: PodAction,
    },
    /// Inspect and operate deployment plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
    /// Debugging access to the coordination store
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
    /// Register the scheduler and drive every plan to its resting state
    Run,
}

#[derive(Subcommand)]
enum PodAction {
    /// List all pod instance names
    List,
    /// Show task status for one instance, or the whole service
    Status {
        instance: Option<String>,
        /// Emit the full status tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show task info for an instance
    Info { instance: String },
}

#[derive(Subcommand)]
enum PlanAction {
    /// List all plan names
    List,
    /// Show a plan with its phase and step statuses
    Show {
        plan: String,
        /// Emit the plan tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset a plan to PENDING, regardless of its status
    ForceRestart { plan: String },
    /// Pause a phase of a plan
    Interrupt { plan: String, phase: String },
    /// Resume a paused phase
    Continue { plan: String, phase: String },
}

#[derive(Subcommand)]
enum DebugAction {
    /// Scheduler state: framework id, properties, the cache
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    /// Configuration versions and the current target
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Show the registered framework id
    FrameworkId,
    /// List all property keys
    Properties,
    /// Show a single property value
    Property { key: String },
    /// Force a state cache reload
    RefreshCache,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List all configuration version ids
    List,
    /// Show a configuration version
    Show { id: String },
    /// Show the current target configuration
    Target,
    /// Show the current target configuration id
    TargetId,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stevedore=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let store = commands::store_path(cli.store);

    match cli.command {
        Commands::Pod { action } => match action {
            PodAction::List => commands::pod::list(&store),
            PodAction::Status { instance, json } => {
                commands::pod::status(&store, instance.as_deref(), json)
            }
            PodAction::Info { instance } => commands::pod::info(&store, &instance),
        },
        Commands::Plan { action } => match action {
            PlanAction::List => commands::plan::list(&store),
            PlanAction::Show { plan, json } => commands::plan::show(&store, &plan, json),
            PlanAction::ForceRestart { plan } => commands::plan::force_restart(&store, &plan),
            PlanAction::Interrupt { plan, phase } => {
                commands::plan::interrupt(&store, &plan, &phase)
            }
            PlanAction::Continue { plan, phase } => commands::plan::proceed(&store, &plan, &phase),
        },
        Commands::Debug { action } => match action {
            DebugAction::State { action } => match action {
                StateAction::FrameworkId => commands::debug::framework_id(&store),
                StateAction::Properties => commands::debug::properties(&store),
                StateAction::Property { key } => commands::debug::property(&store, &key),
                StateAction::RefreshCache => commands::debug::refresh_cache(&store),
            },
            DebugAction::Config { action } => match action {
                ConfigAction::List => commands::debug::config_list(&store),
                ConfigAction::Show { id } => commands::debug::config_show(&store, &id),
                ConfigAction::Target => commands::debug::config_target(&store),
                ConfigAction::TargetId => commands::debug::config_target_id(&store),
            },
        },
        Commands::Run => commands::run::run(&store),
    }
}
