//! wl_cli
//!
//! Runs weightlifting platforms from a competition file and prints every
//! published event as a JSON line on stdout. Logs go to stderr.

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "wl_cli")]
#[command(about = "Run weightlifting fields of play from competition data", long_about = None)]
#[command(version = wl_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Start every platform and replay an operator script
    Run {
        /// Competition data (JSON)
        #[arg(long)]
        data: PathBuf,

        /// Engine configuration (YAML); WL_ENGINE_PROFILE preset otherwise
        #[arg(long)]
        config: Option<PathBuf>,

        /// Script of commands, one JSON object per line
        #[arg(long)]
        script: Option<PathBuf>,
    },

    /// Print a JSON schema
    Schema {
        #[arg(long, value_enum)]
        kind: wl_cli::SchemaKind,
    },

    /// Draw lot numbers for a group
    Draw {
        /// Competition data (JSON)
        #[arg(long)]
        data: PathBuf,

        #[arg(long)]
        group: String,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[cfg(feature = "cli")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, config, script } => {
            let competition = wl_cli::load_competition(&data)?;
            let engine_config = wl_cli::load_config(config.as_deref())?;
            let lines = match script {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read script: {}", path.display()))?;
                    wl_cli::parse_script(&text)?
                }
                None => Vec::new(),
            };

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let summary = wl_cli::run(competition, engine_config, &lines, &mut out).await?;
            tracing::info!(
                platforms = summary.platforms,
                commands = summary.commands,
                rejected = summary.rejected,
                events = summary.events,
                "run finished"
            );
        }

        Commands::Schema { kind } => {
            println!("{}", wl_cli::schema_json(kind)?);
        }

        Commands::Draw { data, group, seed } => {
            let competition = wl_cli::load_competition(&data)?;
            for lot in wl_cli::draw(&competition, &group.as_str().into(), seed)? {
                println!("{:>3}  {:>5}  {}", lot.lot_number, lot.athlete, lot.name);
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("wl_cli is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
