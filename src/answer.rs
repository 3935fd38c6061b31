//! Answer questions over retrieved chunks.
//!
//! Concatenates the top search results into a fenced-code context block and
//! delegates to the configured [`ChatClient`]. Retrieval itself lives in
//! [`crate::search`]; this module only shapes the prompt and the reply.

use crate::chat::ChatClient;
use crate::embedding::Embedder;
use crate::error::EmbeddingError;
use crate::models::SearchResult;
use crate::search::{self, SearchOptions};
use crate::store::VectorStore;

const SYSTEM_PROMPT: &str =
    "You are a concise code assistant. Answer using only the provided code context. \
     Cite files and line ranges when relevant.";

const MAX_ANSWER_TOKENS: u32 = 1000;

/// Bytes of parent content shown when a result carries no chunk text.
const CONTENT_PREVIEW_BYTES: usize = 1024;

const EMPTY_ANSWER_FALLBACK: &str = "No answer was produced for this question.";

/// Search for `query`, then ask the chat model to answer over the hits.
///
/// # Errors
///
/// [`EmbeddingError::NotConfigured`] when no chat client is available;
/// retrieval and chat failures propagate unchanged.
pub async fn ask(
    store: &VectorStore,
    embedder: &dyn Embedder,
    chat: Option<&dyn ChatClient>,
    query: &str,
    top_k: usize,
) -> Result<String, EmbeddingError> {
    let chat = chat.ok_or_else(|| {
        EmbeddingError::NotConfigured(
            "ask requires a chat provider; configure an OpenAI API key".to_string(),
        )
    })?;

    let options = SearchOptions {
        top_k,
        include_content: true,
        ..Default::default()
    };
    let results = search::search(store, embedder, query, &options).await?;

    if results.is_empty() {
        return Ok("No matching code was found for this question.".to_string());
    }

    let context = build_context(&results);
    let user = format!(
        "Context from the codebase:\n\n{}\nQuestion: {}",
        context, query
    );

    let answer = chat.complete(SYSTEM_PROMPT, &user, MAX_ANSWER_TOKENS).await?;
    if answer.trim().is_empty() {
        Ok(EMPTY_ANSWER_FALLBACK.to_string())
    } else {
        Ok(answer)
    }
}

/// Render results as `File: path (lines a-b)` headers over fenced blocks.
fn build_context(results: &[SearchResult]) -> String {
    let mut context = String::new();
    for result in results {
        context.push_str(&format!(
            "File: {} (lines {}-{})\n```\n",
            result.path, result.line_start, result.line_end
        ));
        if !result.chunk.is_empty() {
            context.push_str(&result.chunk);
        } else if let Some(content) = &result.content {
            let mut preview = String::new();
            for c in content.chars() {
                if preview.len() + c.len_utf8() > CONTENT_PREVIEW_BYTES {
                    break;
                }
                preview.push(c);
            }
            context.push_str(&preview);
        }
        context.push_str("\n```\n\n");
    }
    context
}
