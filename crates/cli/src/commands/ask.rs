//! `quarry ask` — Ask a question against the indexed documents.

use crate::stack;
use quarry_core::answer::AnswerEvent;
use quarry_core::store::Citation;
use std::io::Write;

pub async fn run(
    question: &str,
    user: &str,
    lang: Option<&str>,
    top_k: Option<usize>,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stack = stack::build().await?;

    if stream {
        let mut rx = stack
            .pipeline
            .stream_answer(user, question, top_k, lang)
            .await?;

        let mut citations: Vec<Citation> = Vec::new();
        while let Some(event) = rx.recv().await {
            match event? {
                AnswerEvent::Partial { content } => {
                    print!("{content}");
                    std::io::stdout().flush()?;
                }
                AnswerEvent::Final { citations: c, .. } => {
                    citations = c;
                }
            }
        }
        println!();
        print_citations(&citations);
    } else {
        let answer = stack.pipeline.answer(user, question, top_k, lang).await?;
        println!("{}", answer.text);
        print_citations(&answer.citations);
    }

    Ok(())
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for citation in citations {
        match citation.score {
            Some(score) => println!(
                "  {} (chunk {}, similarity {score:.2})",
                citation.file, citation.chunk
            ),
            None => println!("  {} (chunk {})", citation.file, citation.chunk),
        }
    }
}
