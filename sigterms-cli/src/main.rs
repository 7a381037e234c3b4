use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "sigterms")]
#[command(about = "Significant terms tools - encode, inspect and reduce shard partials")]
#[command(version)]
struct Cli {
    /// Aggregation config (TOML); defaults are used if missing
    #[arg(short, long, global = true, env = "SIGTERMS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a JSON shard fixture into a binary partial
    Encode {
        /// JSON fixture with totals and buckets
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the encoded partial
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the header and buckets of an encoded partial
    Inspect {
        /// Encoded partial
        file: PathBuf,

        /// Show every bucket, not just the first 20
        #[arg(short, long)]
        verbose: bool,
    },

    /// Reduce encoded partials and print the rendered result
    Reduce {
        /// Encoded partials, one per shard
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also write the reduced partial, encoded, to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode { input, output } => {
            commands::run_encode(&input, &output, &config)?;
        }
        Commands::Inspect { file, verbose } => {
            commands::run_inspect(&file, verbose)?;
        }
        Commands::Reduce {
            files,
            output,
            pretty,
        } => {
            commands::run_reduce(&files, output.as_deref(), pretty, &config)?;
        }
    }

    Ok(())
}
