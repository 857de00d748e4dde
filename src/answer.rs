//! Retrieval-augmented answering with a raw-text fallback.
//!
//! Per request the engine collapses to one of two mutually exclusive
//! context sources: semantically retrieved chunks when an index is
//! available, or the document's raw extracted text truncated to a fixed
//! budget. That keeps the contract simple and guarantees an answer is
//! always attempted whenever the document is extractable, even with zero
//! infrastructure beyond one chat credential.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::Config;
use crate::extract;
use crate::locks::FileLocks;
use crate::models::Answer;
use crate::provider::{self, Provider};
use crate::retrieve;

/// Maximum characters of context echoed back in the response.
const CONTEXT_PREVIEW_CHARS: usize = 500;

const TRUNCATION_MARKER: &str = "\n\n[... document truncated to fit the context window ...]";
const NOT_FOUND_ANSWER: &str = "Document not found.";
const UNREADABLE_ANSWER: &str = "Could not read the document. Check that the file exists.";

/// Answer a question about one document.
///
/// Terminal non-error paths: an unknown document id and an unreadable
/// document both return a fixed answer with similarity 0. The only error
/// that propagates is a chat backend failure.
pub async fn answer(
    config: &Config,
    pool: &SqlitePool,
    locks: &FileLocks,
    document_id: &str,
    question: &str,
    requested: Option<Provider>,
) -> Result<Answer> {
    let provider_name = requested
        .unwrap_or_else(|| provider::default_provider(&config.providers))
        .name()
        .to_string();

    let doc = match crate::store::find_document(pool, document_id).await? {
        Some(doc) => doc,
        None => {
            return Ok(Answer {
                answer: NOT_FOUND_ANSWER.to_string(),
                context: String::new(),
                similarity: 0.0,
                provider: provider_name,
            })
        }
    };

    // Semantic retrieval first; empty or failed retrieval falls through.
    let mut context = retrieve::retrieve(config, pool, document_id, question, requested)
        .await
        .map(|r| r.text);

    if context.is_none() {
        let extracted = {
            let _guard = locks.read(document_id).await;
            extract::extract_document(&config.storage.root, &doc).await
        };
        match extracted {
            Ok(full_text) => {
                let (truncated, was_truncated) =
                    truncate_context(&full_text, config.answer.context_budget);
                let mut fallback = truncated;
                if was_truncated {
                    fallback.push_str(TRUNCATION_MARKER);
                }
                context = Some(fallback);
            }
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "fallback extraction failed");
                return Ok(Answer {
                    answer: UNREADABLE_ANSWER.to_string(),
                    context: String::new(),
                    similarity: 0.0,
                    provider: provider_name,
                });
            }
        }
    }

    let context = context.unwrap_or_default();
    let prompt = build_prompt(&context, question);

    let backend = provider::chat_backend(&config.providers, requested);
    let text = backend.complete(&prompt).await?;

    Ok(Answer {
        answer: text,
        context: preview(&context),
        similarity: 1.0,
        provider: provider_name,
    })
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a document analyst. Use the context below to answer the operator's question.\n\
         If the information is not in the context, say it was not found in the document.\n\n\
         CONTEXT:\n{}\n\nQUESTION: {}\n",
        context, question
    )
}

/// Cut `text` to `budget` characters. Returns the (possibly shortened)
/// text and whether anything was cut.
fn truncate_context(text: &str, budget: usize) -> (String, bool) {
    if text.chars().count() <= budget {
        (text.to_string(), false)
    } else {
        (text.chars().take(budget).collect(), true)
    }
}

fn preview(context: &str) -> String {
    context.chars().take(CONTEXT_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_budget_text_is_untouched() {
        let (text, truncated) = truncate_context("short text", 8000);
        assert_eq!(text, "short text");
        assert!(!truncated);
    }

    #[test]
    fn text_at_budget_is_untouched() {
        let input = "x".repeat(8000);
        let (text, truncated) = truncate_context(&input, 8000);
        assert_eq!(text.chars().count(), 8000);
        assert!(!truncated);
    }

    #[test]
    fn over_budget_text_is_cut_to_exactly_budget() {
        let input = "y".repeat(8001);
        let (text, truncated) = truncate_context(&input, 8000);
        assert_eq!(text.chars().count(), 8000);
        assert!(truncated);
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        let input = "é".repeat(9000);
        let (text, truncated) = truncate_context(&input, 8000);
        assert_eq!(text.chars().count(), 8000);
        assert!(truncated);
    }

    #[test]
    fn preview_caps_at_500_chars() {
        let long = "c".repeat(2000);
        assert_eq!(preview(&long).chars().count(), 500);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn prompt_embeds_context_and_verbatim_question() {
        let p = build_prompt("the context block", "What is  this?");
        assert!(p.contains("CONTEXT:\nthe context block"));
        assert!(p.contains("QUESTION: What is  this?"));
    }
}
