//! Editor revision synchronization.
//!
//! The external editor posts asynchronous save notifications; only status 2
//! ("ready for saving") carries a new revision. The editor reports the
//! download URL using its externally visible hostname, which is unreachable
//! from inside the deployment network, so the host is rewritten to the
//! internal service address before fetching.
//!
//! The acknowledgement is a strict two-value contract: `{"error": 0}` or
//! `{"error": 1}`, always under a successful transport status — the
//! editor's retry logic reads the payload, not the HTTP code.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::config::Config;
use crate::locks::FileLocks;
use crate::store;

/// Editor status code meaning a new revision is ready to be fetched.
pub const STATUS_READY_FOR_SAVING: i64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("revision fetch failed: {0}")]
    Fetch(String),
    #[error("revision write failed: {0}")]
    Write(String),
}

/// Save-notification acknowledgement. Serializes to exactly
/// `{"error": 0}` or `{"error": 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub error: u8,
}

impl Ack {
    pub fn accepted() -> Self {
        Self { error: 0 }
    }
    pub fn rejected() -> Self {
        Self { error: 1 }
    }
}

/// Handle one save notification. Never returns an error: failures are
/// logged and surfaced as a rejection payload.
pub async fn handle_save_notification(
    config: &Config,
    pool: &SqlitePool,
    locks: &FileLocks,
    document_id: &str,
    status: i64,
    url: &str,
) -> Ack {
    info!(document_id = %document_id, status, "editor save notification");

    if status != STATUS_READY_FOR_SAVING {
        // Opened, closed without changes, errored on the editor side:
        // acknowledged without touching storage.
        return Ack::accepted();
    }

    match apply_revision(config, pool, locks, document_id, url).await {
        Ok(()) => {
            info!(document_id = %document_id, "document revision saved");
            Ack::accepted()
        }
        Err(e) => {
            error!(document_id = %document_id, error = %e, "failed to save document revision");
            Ack::rejected()
        }
    }
}

/// Fetch the new binary and atomically replace the stored revision, then
/// bump the metadata timestamp. Holds the document's exclusive file lock
/// across fetch-write-rename so no reader sees a half-written file.
async fn apply_revision(
    config: &Config,
    pool: &SqlitePool,
    locks: &FileLocks,
    document_id: &str,
    url: &str,
) -> Result<(), SyncError> {
    let doc = store::find_document(pool, document_id)
        .await
        .map_err(|e| SyncError::Fetch(e.to_string()))?
        .ok_or_else(|| SyncError::UnknownDocument(document_id.to_string()))?;

    let internal_url = url.replace(&config.editor.public_host, &config.editor.internal_host);
    info!(url = %internal_url, "downloading updated revision from internal URL");

    let _guard = locks.write(document_id).await;

    let mut response = reqwest::get(&internal_url)
        .await
        .map_err(|e| SyncError::Fetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(SyncError::Fetch(format!(
            "download returned status {}",
            response.status()
        )));
    }

    let final_path = config.storage.root.join(&doc.path);
    let part_path = std::path::PathBuf::from(format!("{}.part", final_path.display()));

    let mut file = tokio::fs::File::create(&part_path)
        .await
        .map_err(|e| SyncError::Write(e.to_string()))?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| SyncError::Fetch(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| SyncError::Write(e.to_string()))?;
    }
    file.flush()
        .await
        .map_err(|e| SyncError::Write(e.to_string()))?;
    drop(file);

    tokio::fs::rename(&part_path, &final_path)
        .await
        .map_err(|e| SyncError::Write(e.to_string()))?;

    // Only after the rename completes does the metadata record move.
    let updated_at = Utc::now().timestamp_millis().max(doc.updated_at + 1);
    store::touch_document(pool, document_id, updated_at)
        .await
        .map_err(|e| SyncError::Write(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serializes_to_strict_two_value_contract() {
        assert_eq!(
            serde_json::to_string(&Ack::accepted()).unwrap(),
            r#"{"error":0}"#
        );
        assert_eq!(
            serde_json::to_string(&Ack::rejected()).unwrap(),
            r#"{"error":1}"#
        );
    }
}
