//! Indexing pipeline and background queue.
//!
//! One indexing pass runs extract → chunk → embed → store for a single
//! document. A missing embedding capability is a normal, expected state
//! (the document stays answerable through the raw-text fallback), so it
//! yields a skip, not an error.
//!
//! Re-indexing replaces: the document's previous chunk set is deleted
//! before the first new insert, so a failure partway through leaves a
//! partial index of the new generation only, never a mix of generations.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunk;
use crate::config::Config;
use crate::extract;
use crate::locks::FileLocks;
use crate::models::StoredChunk;
use crate::provider::{self, Provider};
use crate::store;

/// Result of one indexing pass.
#[derive(Debug, Clone)]
pub enum IndexOutcome {
    Indexed { chunks: usize },
    Skipped { reason: String },
}

/// Run one indexing pass for a document. Errors propagate to the caller;
/// the background queue catches and logs them so they never escape the
/// fire-and-forget boundary.
pub async fn index_document(
    config: &Config,
    pool: &SqlitePool,
    locks: &FileLocks,
    document_id: &str,
    requested: Option<Provider>,
) -> Result<IndexOutcome> {
    let doc = match store::find_document(pool, document_id).await? {
        Some(doc) => doc,
        None => {
            return Ok(IndexOutcome::Skipped {
                reason: format!("unknown document: {}", document_id),
            })
        }
    };

    if !provider::has_embedding_capability(&config.providers) {
        info!(
            filename = %doc.filename,
            "skipping vector indexing - no embedding credential configured, direct text mode will be used"
        );
        return Ok(IndexOutcome::Skipped {
            reason: "no embedding capability".to_string(),
        });
    }

    let backend = match provider::embedding_backend(&config.providers, requested) {
        Some(b) => b,
        None => {
            return Ok(IndexOutcome::Skipped {
                reason: "no embedding backend".to_string(),
            })
        }
    };

    let text = {
        let _guard = locks.read(document_id).await;
        extract::extract_document(&config.storage.root, &doc).await?
    };
    let pieces = chunk::split(&text, config.chunking.size, config.chunking.overlap);

    // Replace, never merge: drop the prior generation first.
    store::delete_document_chunks(pool, document_id).await?;

    let mut stored = 0usize;
    for (i, content) in pieces.iter().enumerate() {
        let vector = backend.embed(content).await?;
        let chunk = StoredChunk {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index: i as i64,
            content: content.clone(),
            embedding: provider::vec_to_blob(&vector),
        };
        store::insert_chunk(pool, &chunk).await?;
        stored += 1;
    }

    info!(filename = %doc.filename, chunks = stored, "document indexed");
    Ok(IndexOutcome::Indexed { chunks: stored })
}

/// A queued indexing request.
#[derive(Debug, Clone)]
pub struct IndexJob {
    pub document_id: String,
    pub provider: Option<Provider>,
}

/// Observable outcome of a background indexing job.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    Started { document_id: String },
    Completed { document_id: String, chunks: usize },
    Skipped { document_id: String, reason: String },
    Failed { document_id: String, error: String },
}

/// Bounded background indexing queue.
///
/// `submit` never blocks: a full queue rejects the job with a warning and
/// the caller reports `queued: false`, preserving the fire-and-forget
/// contract. Job outcomes are published on a broadcast channel for
/// monitoring, in addition to the tracing log.
#[derive(Clone)]
pub struct IndexQueue {
    jobs: mpsc::Sender<IndexJob>,
    events: broadcast::Sender<IndexEvent>,
}

impl IndexQueue {
    pub fn start(config: Arc<Config>, pool: SqlitePool, locks: FileLocks) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel::<IndexJob>(config.indexing.queue_capacity);
        let (events_tx, _) = broadcast::channel(64);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        for _ in 0..config.indexing.workers {
            let rx = jobs_rx.clone();
            let events = events_tx.clone();
            let config = config.clone();
            let pool = pool.clone();
            let locks = locks.clone();
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    run_job(&config, &pool, &locks, &events, job).await;
                }
            });
        }

        Self {
            jobs: jobs_tx,
            events: events_tx,
        }
    }

    /// Enqueue a job without blocking. Returns false when the queue is full.
    pub fn submit(&self, job: IndexJob) -> bool {
        match self.jobs.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(document_id = %job.document_id, "indexing queue full, job rejected");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(document_id = %job.document_id, "indexing queue closed, job rejected");
                false
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }
}

async fn run_job(
    config: &Config,
    pool: &SqlitePool,
    locks: &FileLocks,
    events: &broadcast::Sender<IndexEvent>,
    job: IndexJob,
) {
    let document_id = job.document_id.clone();
    let _ = events.send(IndexEvent::Started {
        document_id: document_id.clone(),
    });

    match index_document(config, pool, locks, &job.document_id, job.provider).await {
        Ok(IndexOutcome::Indexed { chunks }) => {
            let _ = events.send(IndexEvent::Completed {
                document_id,
                chunks,
            });
        }
        Ok(IndexOutcome::Skipped { reason }) => {
            info!(document_id = %document_id, reason = %reason, "indexing skipped");
            let _ = events.send(IndexEvent::Skipped {
                document_id,
                reason,
            });
        }
        Err(e) => {
            error!(document_id = %document_id, error = %e, "indexing failed");
            let _ = events.send(IndexEvent::Failed {
                document_id,
                error: e.to_string(),
            });
        }
    }
}
