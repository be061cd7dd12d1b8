mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::feature::FeatureSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "featflow",
    about = "File-backed feature lifecycle: discovery through completion",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .featflow/ or .git/)
    #[arg(long, global = true, env = "FEATFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and create the feature roots
    Init,

    /// Manage features
    Feature {
        #[command(subcommand)]
        subcommand: FeatureSubcommand,
    },

    /// Archive a feature
    Archive { name: String },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Feature { subcommand } => cmd::feature::run(&root, subcommand, cli.json),
        Commands::Archive { name } => {
            cmd::feature::run(&root, FeatureSubcommand::Archive { name }, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
