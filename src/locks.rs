//! Per-document file locks.
//!
//! Serializes file I/O for one document between the revision synchronizer
//! (exclusive, across fetch-write-rename) and extraction on the answer and
//! indexing paths (shared). Locks for different documents are independent,
//! so concurrent requests against different documents never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Clone, Default)]
pub struct FileLocks {
    inner: Arc<Mutex<HashMap<String, Arc<RwLock<()>>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, document_id: &str) -> Arc<RwLock<()>> {
        let mut map = self.inner.lock().expect("lock registry poisoned");
        map.entry(document_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Shared lock for reading the document's binary.
    pub async fn read(&self, document_id: &str) -> OwnedRwLockReadGuard<()> {
        self.entry(document_id).read_owned().await
    }

    /// Exclusive lock for replacing the document's binary.
    pub async fn write(&self, document_id: &str) -> OwnedRwLockWriteGuard<()> {
        self.entry(document_id).write_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn readers_share_writers_exclude() {
        let locks = FileLocks::new();
        let r1 = locks.read("doc").await;
        let r2 = locks.read("doc").await;
        assert!(locks.entry("doc").try_write().is_err());
        drop(r1);
        drop(r2);
        let _w = locks.write("doc").await;
        assert!(locks.entry("doc").try_read().is_err());
    }

    #[tokio::test]
    async fn different_documents_do_not_contend() {
        let locks = FileLocks::new();
        let _w = locks.write("a").await;
        let _r = locks.read("b").await;
    }
}
