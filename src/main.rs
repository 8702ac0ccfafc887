use std::path::PathBuf;

use clap::{Parser, Subcommand};
use floatchat::Result;
use floatchat::commands::{ask, chat, ingest, init_config, show_config, status};

#[derive(Parser)]
#[command(name = "floatchat")]
#[command(about = "Retrieval-augmented question answering over oceanographic sensor data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or inspect the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a CSV file of sensor records and build the vector index
    Ingest {
        /// Path to the CSV file
        csv: PathBuf,
    },
    /// Ask a single question against the ingested data
    Ask {
        /// The question to answer
        question: String,
    },
    /// Start an interactive question/answer session
    Chat,
    /// Show the state of the persisted index
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                init_config()?;
            }
        }
        Commands::Ingest { csv } => {
            ingest(csv).await?;
        }
        Commands::Ask { question } => {
            ask(question).await?;
        }
        Commands::Chat => {
            chat().await?;
        }
        Commands::Status => {
            status()?;
        }
    }

    Ok(())
}
