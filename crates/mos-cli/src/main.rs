use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod study;

use study::{
    GroupCommand, ImportArgs, PeersArgs, ProfileCommand, QuizArgs, ReflectArgs, ShareArgs,
    StudyContext,
};

#[derive(Parser)]
#[command(name = "mos")]
#[command(about = "Mini OpenStax study companion", long_about = None)]
struct Cli {
    /// Path to the study database file
    #[arg(long, global = true)]
    store: Option<std::path::PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the active study group
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Manage the local profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Save a reflection for a lesson
    Reflect(ReflectArgs),
    /// List peer reflections for a lesson
    Peers(PeersArgs),
    /// Score a quiz and keep the result
    Quiz(QuizArgs),
    /// Build the shareable insight message for a lesson
    Share(ShareArgs),
    /// Import a peer insight pasted from the share channel
    Import(ImportArgs),
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let ctx = StudyContext::new(cli.store)?;

    match cli.command {
        Commands::Group { action } => study::handle_group_command(&ctx, action),
        Commands::Profile { action } => study::handle_profile_command(&ctx, action),
        Commands::Reflect(args) => study::reflect(&ctx, &args),
        Commands::Peers(args) => study::peers(&ctx, &args),
        Commands::Quiz(args) => study::quiz(&ctx, &args),
        Commands::Share(args) => study::share(&ctx, &args),
        Commands::Import(args) => study::import(&ctx, &args),
    }
}

fn init_logging() {
    let level = std::env::var("MOS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
