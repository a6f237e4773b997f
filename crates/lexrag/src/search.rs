//! `lexrag chunks` and `lexrag search` commands.
//!
//! Both read a document from disk, extract its text, and segment it. `search`
//! additionally builds a one-off index and prints the ranked chunks.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

use lexrag_core::{SearchHit, SimilarityIndex};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::extract::read_document;

/// Characters of chunk text shown per result unless `--full` is given.
const EXCERPT_CHARS: usize = 300;

fn load_text(path: &Path) -> Result<String> {
    read_document(path).with_context(|| format!("Failed to load document {}", path.display()))
}

pub fn run_chunks(config: &Config, path: &Path) -> Result<()> {
    let text = load_text(path)?;
    let chunks = config.segmentation.segmenter().segment(&text)?;
    info!(path = %path.display(), chunks = chunks.len(), "segmented document");

    for chunk in &chunks {
        println!(
            "{}. {} ({} chars)",
            chunk.index,
            chunk.label,
            chunk.text.chars().count()
        );
    }
    println!();
    println!("{} chunks", chunks.len());
    Ok(())
}

pub async fn run_search(
    config: &Config,
    path: &Path,
    query: &str,
    top_k: Option<usize>,
    full: bool,
) -> Result<()> {
    // Input checks run before the document is read or embedded.
    let top_k = config.retrieval.resolve_top_k(top_k);
    if top_k < 1 {
        return Err(lexrag_core::Error::InvalidTopK(top_k).into());
    }
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let text = load_text(path)?;
    let provider = create_provider(&config.embedding)?;
    let mut index = SimilarityIndex::new(provider);
    let count = index
        .build_from_text(&config.segmentation.segmenter(), &text)
        .await?;
    info!(chunks = count, model = index.model_name(), "index built");

    let hits = index.search(query, top_k).await?;
    for hit in &hits {
        print_hit(hit, full);
    }
    Ok(())
}

fn print_hit(hit: &SearchHit, full: bool) {
    println!("{}. [{:.1}%] {}", hit.rank, hit.score, hit.chunk.label);
    println!("    chapter: {}", hit.chunk.chapter_display());
    println!("    article: {}", hit.chunk.article_display());
    if full {
        println!("{}", hit.chunk.text);
    } else {
        println!(
            "    excerpt: \"{}\"",
            excerpt(&hit.chunk.text, EXCERPT_CHARS).replace('\n', " ")
        );
    }
    println!();
}

/// First `max_chars` characters of `text`, with `...` appended if cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
