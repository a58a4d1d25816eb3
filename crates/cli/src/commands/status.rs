//! `quarry status` — Show backend reachability and index size.

use crate::stack;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let stack = stack::build().await?;

    println!("ollama:  {}", stack.config.ollama_url);
    match stack.backend.list_models().await {
        Ok(models) => println!("         reachable, {} models installed", models.len()),
        Err(e) => println!("         unreachable ({e})"),
    }

    println!("chroma:  {}", stack.config.chroma_url);
    let store = stack.store.current().await;
    match store.count().await {
        Ok(count) => println!("         reachable, {count} documents indexed"),
        Err(e) => println!("         unreachable ({e})"),
    }

    let state = stack.registry.snapshot();
    println!("models:  chat={} embedding={}", state.chat_model, state.embedding_model);

    Ok(())
}
