//! Similarity retrieval over a document's stored chunks.
//!
//! Failure here is invisible degradation: any embedding or query error is
//! caught, logged, and reported as "no context", and the caller falls back
//! to raw text. Retrieval never aborts the question-answering flow.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::Config;
use crate::provider::{self, Provider};
use crate::store;

/// Context assembled from the best-matching chunks, best first.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub text: String,
    pub chunks: usize,
}

/// Retrieve the best-matching chunks for a question. `None` means no index
/// is available (no capability, no chunks, or a swallowed failure) and the
/// caller must fall back.
pub async fn retrieve(
    config: &Config,
    pool: &SqlitePool,
    document_id: &str,
    question: &str,
    requested: Option<Provider>,
) -> Option<RetrievedContext> {
    if !provider::has_embedding_capability(&config.providers) {
        return None;
    }

    match try_retrieve(config, pool, document_id, question, requested).await {
        Ok(context) => context,
        Err(e) => {
            warn!(document_id = %document_id, error = %e, "vector search failed, falling back to direct text");
            None
        }
    }
}

async fn try_retrieve(
    config: &Config,
    pool: &SqlitePool,
    document_id: &str,
    question: &str,
    requested: Option<Provider>,
) -> Result<Option<RetrievedContext>> {
    let Some(backend) = provider::embedding_backend(&config.providers, requested) else {
        return Ok(None);
    };

    let question_vector = backend.embed(question).await?;
    let chunks = store::document_chunks(pool, document_id).await?;
    if chunks.is_empty() {
        return Ok(None);
    }

    let ranked = rank_chunks(&question_vector, chunks, config.retrieval.top_k);
    let text = ranked
        .iter()
        .map(|(content, _)| content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(Some(RetrievedContext {
        chunks: ranked.len(),
        text,
    }))
}

/// Order chunks by descending cosine similarity to the query vector and
/// keep the top `limit`. Returned pairs are (content, similarity).
pub fn rank_chunks(
    query: &[f32],
    chunks: Vec<crate::models::StoredChunk>,
    limit: usize,
) -> Vec<(String, f32)> {
    let mut scored: Vec<(String, f32)> = chunks
        .into_iter()
        .map(|c| {
            let similarity = provider::cosine_similarity(query, &provider::blob_to_vec(&c.embedding));
            (c.content, similarity)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoredChunk;
    use crate::provider::vec_to_blob;

    fn chunk(id: &str, content: &str, vector: &[f32]) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            content: content.to_string(),
            embedding: vec_to_blob(vector),
        }
    }

    #[test]
    fn ranks_by_non_increasing_similarity() {
        let query = [1.0, 0.0];
        let chunks = vec![
            chunk("a", "orthogonal", &[0.0, 1.0]),
            chunk("b", "aligned", &[1.0, 0.0]),
            chunk("c", "diagonal", &[1.0, 1.0]),
        ];
        let ranked = rank_chunks(&query, chunks, 10);
        assert_eq!(ranked[0].0, "aligned");
        assert_eq!(ranked[1].0, "diagonal");
        assert_eq!(ranked[2].0, "orthogonal");
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn caps_results_at_limit() {
        let query = [1.0, 0.0];
        let chunks: Vec<StoredChunk> = (0..25)
            .map(|i| chunk(&i.to_string(), &format!("chunk {}", i), &[1.0, i as f32]))
            .collect();
        let ranked = rank_chunks(&query, chunks, 10);
        assert_eq!(ranked.len(), 10);
    }
}
