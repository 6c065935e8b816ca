//! PipeKit CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pipekit")]
#[command(about = "Assemble CI/CD pipeline resource graphs", long_about = None)]
struct Cli {
    /// Target region
    #[arg(long, env = "PIPEKIT_REGION")]
    region: Option<String>,

    /// Target account id
    #[arg(long, env = "PIPEKIT_ACCOUNT")]
    account: Option<String>,

    /// Target partition
    #[arg(long, env = "PIPEKIT_PARTITION")]
    partition: Option<String>,

    /// Source connection id, as NAME=ID (repeatable)
    #[arg(long = "connection", value_name = "NAME=ID")]
    connections: Vec<String>,

    /// Log output format
    #[arg(long, env = "PIPEKIT_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a stack definition without writing anything
    Validate {
        /// Path to the definition file
        #[arg(default_value = "pipekit.kdl")]
        path: String,
    },
    /// Assemble a stack definition and print the resource graph as JSON
    Synth {
        /// Path to the definition file
        #[arg(default_value = "pipekit.kdl")]
        path: String,
        /// Write the graph to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    let target = commands::Target {
        region: cli.region,
        account: cli.account,
        partition: cli.partition,
        connections: cli.connections,
    };

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(&target, &path)?;
        }
        Commands::Synth {
            path,
            output,
            pretty,
        } => {
            commands::synth(&target, &path, output.as_deref(), pretty)?;
        }
    }

    Ok(())
}
