//! Quarry CLI — the main entry point.
//!
//! Commands:
//! - `ask`    — Ask a question against the indexed documents
//! - `models` — List, inspect, and switch the active models
//! - `status` — Show backend reachability and index size

use clap::{Parser, Subcommand};

mod commands;
mod stack;

#[derive(Parser)]
#[command(
    name = "quarry",
    about = "Quarry — retrieval-augmented document QA over local models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question against the indexed documents
    Ask {
        /// The question
        question: String,

        /// User id the conversation history is kept under
        #[arg(short, long, default_value = "cli")]
        user: String,

        /// Language tag for the prompt templates (e.g. "uk", "en")
        #[arg(short, long)]
        lang: Option<String>,

        /// Number of passages to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Stream the answer as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// List, inspect, and switch the active models
    Models {
        #[command(subcommand)]
        command: commands::models::ModelsCommand,
    },

    /// Show backend reachability and index size
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ask { question, user, lang, top_k, stream } => {
            commands::ask::run(&question, &user, lang.as_deref(), top_k, stream).await?
        }
        Commands::Models { command } => commands::models::run(command).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
