//! SQLite-backed vector index for evidence chunks.
//!
//! The database runs in WAL mode so readers never wait on a writer. All
//! functions here are synchronous; the store calls them from blocking
//! threads, each with its own connection.

use crate::types::StoredChunk;
use arag_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a competing writer before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (and create if needed) the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| AppError::Knowledge(format!("Failed to set busy timeout: {}", e)))?;

    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to enable WAL mode: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            provenance TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            ingested_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_provenance ON chunks(provenance);

        CREATE TABLE IF NOT EXISTS topics (
            topic TEXT PRIMARY KEY
        );
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Insert chunks in a single transaction.
///
/// Re-inserting a chunk with the same id replaces the stored row.
pub fn insert_chunks(conn: &mut Connection, chunks: &[StoredChunk]) -> AppResult<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

    let now = Utc::now().to_rfc3339();
    {
        let mut stmt = tx
            .prepare(
                "INSERT OR REPLACE INTO chunks (id, provenance, position, text, embedding, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare insert: {}", e)))?;

        for chunk in chunks {
            stmt.execute(params![
                chunk.id,
                chunk.provenance,
                chunk.position as i64,
                chunk.text,
                embedding_to_bytes(&chunk.embedding),
                now,
            ])
            .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;
        }
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit chunks: {}", e)))?;

    Ok(chunks.len())
}

/// Query the index for the top-k most similar chunks.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<(StoredChunk, f32)>> {
    let mut stmt = conn
        .prepare("SELECT id, provenance, position, text, embedding FROM chunks")
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                embedding_bytes,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (id, provenance, position, text, embedding_bytes) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk: {}", e)))?;
        let embedding = bytes_to_embedding(&embedding_bytes)?;
        let score = cosine_similarity(query_embedding, &embedding);
        results.push((
            StoredChunk {
                id,
                provenance,
                position: position as u32,
                text,
                embedding,
            },
            score,
        ));
    }

    // Sort by score descending; ties broken by id
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });

    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Add topics, ignoring ones already stored.
pub fn insert_topics(conn: &mut Connection, topics: &[String]) -> AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

    {
        let mut stmt = tx
            .prepare("INSERT OR IGNORE INTO topics (topic) VALUES (?1)")
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare topic insert: {}", e)))?;
        for topic in topics {
            stmt.execute(params![topic])
                .map_err(|e| AppError::Knowledge(format!("Failed to insert topic: {}", e)))?;
        }
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit topics: {}", e)))?;
    Ok(())
}

/// Load every persisted topic.
pub fn load_topics(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT topic FROM topics ORDER BY topic")
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare topic query: {}", e)))?;

    let topics = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to query topics: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Knowledge(format!("Failed to read topic: {}", e)))?;

    Ok(topics)
}

/// Count documents, chunks, and topics; report the latest ingestion time.
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32, u32, Option<DateTime<Utc>>)> {
    let count = |sql: &str, what: &str| -> AppResult<u32> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0).map(|v| v as u32))
            .map_err(|e| AppError::Knowledge(format!("Failed to count {}: {}", what, e)))
    };

    let documents = count("SELECT COUNT(DISTINCT provenance) FROM chunks", "documents")?;
    let chunks = count("SELECT COUNT(*) FROM chunks", "chunks")?;
    let topics = count("SELECT COUNT(*) FROM topics", "topics")?;

    let last: Option<String> = conn
        .query_row("SELECT MAX(ingested_at) FROM chunks", [], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()
        .map_err(|e| AppError::Knowledge(format!("Failed to read ingestion time: {}", e)))?
        .flatten();

    let last_ingested_at = last
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok((documents, chunks, topics, last_ingested_at))
}

/// Reset the index (delete all chunks and topics).
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("DELETE FROM chunks; DELETE FROM topics;")
        .map_err(|e| AppError::Knowledge(format!("Failed to reset index: {}", e)))?;

    tracing::info!("Reset evidence index");
    Ok(())
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: &str, provenance: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            provenance: provenance.to_string(),
            position: 0,
            text: format!("text of {}", id),
            embedding,
        }
    }

    #[test]
    fn test_init_index_creates_tables() {
        let temp = TempDir::new().unwrap();
        let conn = init_index(&temp.path().join("index.sqlite")).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('chunks', 'topics')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 2);

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_insert_and_query_ranked() {
        let temp = TempDir::new().unwrap();
        let mut conn = init_index(&temp.path().join("index.sqlite")).unwrap();

        insert_chunks(
            &mut conn,
            &[
                chunk("a", "doc1", vec![1.0, 0.0, 0.0]),
                chunk("b", "doc2", vec![0.0, 1.0, 0.0]),
                chunk("c", "doc2", vec![0.7, 0.7, 0.0]),
            ],
        )
        .unwrap();

        let results = query_chunks(&conn, &[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "a");
        assert_eq!(results[1].0.id, "c");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_reinsert_replaces() {
        let temp = TempDir::new().unwrap();
        let mut conn = init_index(&temp.path().join("index.sqlite")).unwrap();

        insert_chunks(&mut conn, &[chunk("a", "doc1", vec![1.0, 0.0])]).unwrap();
        insert_chunks(&mut conn, &[chunk("a", "doc1", vec![1.0, 0.0])]).unwrap();

        let (documents, chunks, _, last) = get_stats(&conn).unwrap();
        assert_eq!(documents, 1);
        assert_eq!(chunks, 1);
        assert!(last.is_some());
    }

    #[test]
    fn test_topics_are_a_set() {
        let temp = TempDir::new().unwrap();
        let mut conn = init_index(&temp.path().join("index.sqlite")).unwrap();

        insert_topics(&mut conn, &["whales".to_string(), "oceans".to_string()]).unwrap();
        insert_topics(&mut conn, &["whales".to_string()]).unwrap();

        assert_eq!(load_topics(&conn).unwrap(), vec!["oceans", "whales"]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let temp = TempDir::new().unwrap();
        let mut conn = init_index(&temp.path().join("index.sqlite")).unwrap();

        insert_chunks(&mut conn, &[chunk("a", "doc1", vec![1.0])]).unwrap();
        insert_topics(&mut conn, &["whales".to_string()]).unwrap();
        reset_index(&conn).unwrap();

        let (documents, chunks, topics, last) = get_stats(&conn).unwrap();
        assert_eq!((documents, chunks, topics), (0, 0, 0));
        assert!(last.is_none());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_length_check() {
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
        assert_eq!(
            bytes_to_embedding(&embedding_to_bytes(&[0.5, -2.0])).unwrap(),
            vec![0.5, -2.0]
        );
    }
}
