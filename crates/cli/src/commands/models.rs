//! `quarry models` — List, inspect, and switch the active models.

use crate::stack;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ModelsCommand {
    /// List models installed on the backend
    List,

    /// Show the current chat/embedding model selection
    Current,

    /// Switch the chat model
    UseChat {
        /// Model name as reported by `models list`
        name: String,
    },

    /// Switch the embedding model and rebuild the vector index
    UseEmbedding {
        /// Model name as reported by `models list`
        name: String,
    },
}

pub async fn run(command: ModelsCommand) -> Result<(), Box<dyn std::error::Error>> {
    let stack = stack::build().await?;

    match command {
        ModelsCommand::List => {
            for name in stack.models.installed().await? {
                println!("{name}");
            }
        }
        ModelsCommand::Current => {
            let state = stack.models.current();
            println!(
                "chat:      {} ({} tokens)",
                state.chat_model, state.chat_model_max_tokens
            );
            println!(
                "embedding: {} ({} tokens)",
                state.embedding_model, state.embedding_model_max_tokens
            );
        }
        ModelsCommand::UseChat { name } => {
            stack.models.select_chat_model(&name).await?;
            println!("Chat model set to {name}");
        }
        ModelsCommand::UseEmbedding { name } => {
            println!("Switching embedding model and rebuilding the index...");
            let count = stack.models.select_embedding_model(&name).await?;
            println!("Embedding model set to {name}; {count} documents reindexed");
        }
    }

    Ok(())
}
