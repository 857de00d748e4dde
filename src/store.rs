//! Document and chunk persistence.
//!
//! All SQL lives here. Documents are mutated only by registration, the
//! revision synchronizer (`touch_document`), and deletion; chunks are
//! replaced wholesale per document by the indexer.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{Document, StoredChunk};

pub async fn insert_document(pool: &SqlitePool, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, filename, path, size, mime_type, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.filename)
    .bind(&doc.path)
    .bind(doc.size)
    .bind(&doc.mime_type)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, filename, path, size, mime_type, created_at, updated_at
         FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(document_from_row).transpose()
}

pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        "SELECT id, filename, path, size, mime_type, created_at, updated_at
         FROM documents ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(document_from_row).collect()
}

/// Delete a document row and its chunk set. The stored binary is the
/// caller's to remove (it needs the storage root).
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<()> {
    delete_document_chunks(pool, id).await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Bump a document's `updated_at` timestamp.
pub async fn touch_document(pool: &SqlitePool, id: &str, updated_at: i64) -> Result<()> {
    sqlx::query("UPDATE documents SET updated_at = ? WHERE id = ?")
        .bind(updated_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop a document's entire chunk set. Re-indexing replaces, never merges:
/// the old generation is deleted before the first new insert.
pub async fn delete_document_chunks(pool: &SqlitePool, document_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_chunk(pool: &SqlitePool, chunk: &StoredChunk) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO document_chunks (id, document_id, chunk_index, content, embedding)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&chunk.id)
    .bind(&chunk.document_id)
    .bind(chunk.chunk_index)
    .bind(&chunk.content)
    .bind(&chunk.embedding)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn document_chunks(pool: &SqlitePool, document_id: &str) -> Result<Vec<StoredChunk>> {
    let rows = sqlx::query(
        "SELECT id, document_id, chunk_index, content, embedding
         FROM document_chunks WHERE document_id = ? ORDER BY chunk_index ASC",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(StoredChunk {
                id: row.try_get("id")?,
                document_id: row.try_get("document_id")?,
                chunk_index: row.try_get("chunk_index")?,
                content: row.try_get("content")?,
                embedding: row.try_get("embedding")?,
            })
        })
        .collect()
}

pub async fn chunk_count(pool: &SqlitePool, document_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
        .bind(document_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn document_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        path: row.try_get("path")?,
        size: row.try_get("size")?,
        mime_type: row.try_get("mime_type")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
