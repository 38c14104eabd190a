//! SQLite-backed conversation store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arag_core::{AppError, AppResult};
use arag_knowledge::EvidenceChunk;
use arag_workflow::Role;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::store::ConversationStore;
use crate::types::{
    Conversation, ConversationId, ConversationSummary, SourceRecord, StoredMessage,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Conversation store in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    db_path: PathBuf,
}

impl SqliteConversationStore {
    /// Open (and create if needed) the history database.
    pub async fn open(db_path: impl Into<PathBuf>) -> AppResult<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        store.with_conn(|_| Ok(())).await?;
        debug!("Opened conversation history at {:?}", store.db_path);
        Ok(store)
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = init_db(&db_path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::History(format!("History task failed: {}", e)))?
    }
}

fn init_db(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::History(format!("Failed to create history directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::History(format!("Failed to open history database: {}", e)))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| AppError::History(format!("Failed to set busy timeout: {}", e)))?;

    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            activity INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);

        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            source TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_sources_message ON sources(message_id);
        "#,
    )
    .map_err(|e| AppError::History(format!("Failed to create tables: {}", e)))?;

    Ok(conn)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::History(format!("Invalid timestamp '{}': {}", value, e)))
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::History(format!("{}: {}", context, e))
}

/// Bump the activity counter and timestamp; fails with `NotFound` for an
/// unknown conversation.
fn touch(conn: &Connection, id: ConversationId) -> AppResult<()> {
    let updated = conn
        .execute(
            "UPDATE conversations
             SET updated_at = ?1,
                 activity = (SELECT COALESCE(MAX(activity), 0) + 1 FROM conversations)
             WHERE id = ?2",
            params![now(), id],
        )
        .map_err(db_err("Failed to update conversation"))?;

    if updated == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn not_found(id: ConversationId) -> AppError {
    AppError::NotFound(format!("Conversation {} does not exist", id))
}

fn load_conversation(conn: &Connection, id: ConversationId) -> AppResult<Conversation> {
    let header = conn
        .query_row(
            "SELECT title, created_at, updated_at FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(db_err("Failed to load conversation"))?;

    let Some((title, created_at, updated_at)) = header else {
        return Err(not_found(id));
    };

    let mut stmt = conn
        .prepare(
            "SELECT id, role, content, created_at FROM messages
             WHERE conversation_id = ?1 ORDER BY id",
        )
        .map_err(db_err("Failed to prepare message query"))?;

    let rows = stmt
        .query_map(params![id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(db_err("Failed to query messages"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err("Failed to read message"))?;

    let mut messages = Vec::with_capacity(rows.len());
    for (message_id, role, content, created_at) in rows {
        messages.push(StoredMessage {
            id: message_id,
            role: Role::parse(&role)?,
            content,
            created_at: parse_time(&created_at)?,
            sources: load_sources(conn, message_id)?,
        });
    }

    Ok(Conversation {
        id,
        title,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        messages,
    })
}

fn load_sources(conn: &Connection, message_id: i64) -> AppResult<Vec<SourceRecord>> {
    let mut stmt = conn
        .prepare("SELECT content, source FROM sources WHERE message_id = ?1 ORDER BY id")
        .map_err(db_err("Failed to prepare source query"))?;

    let sources = stmt
        .query_map(params![message_id], |row| {
            Ok(SourceRecord {
                content: row.get(0)?,
                source: row.get(1)?,
            })
        })
        .map_err(db_err("Failed to query sources"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err("Failed to read source"))?;

    Ok(sources)
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create(&self, title: &str) -> AppResult<Conversation> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::History(
                "Conversation title must not be empty".to_string(),
            ));
        }

        let conversation = self
            .with_conn(move |conn| {
                let ts = now();
                conn.execute(
                    "INSERT INTO conversations (title, created_at, updated_at, activity)
                     VALUES (?1, ?2, ?2, (SELECT COALESCE(MAX(activity), 0) + 1 FROM conversations))",
                    params![title, ts],
                )
                .map_err(db_err("Failed to create conversation"))?;
                let id = conn.last_insert_rowid();
                load_conversation(conn, id)
            })
            .await?;

        info!(id = conversation.id, "Created conversation '{}'", conversation.title);
        Ok(conversation)
    }

    async fn get(&self, id: ConversationId) -> AppResult<Conversation> {
        self.with_conn(move |conn| load_conversation(conn, id)).await
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        role: Role,
        content: &str,
        sources: &[EvidenceChunk],
    ) -> AppResult<StoredMessage> {
        let content = content.to_string();
        let sources: Vec<SourceRecord> = sources.iter().map(SourceRecord::from).collect();

        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_err("Failed to begin transaction"))?;

            touch(&tx, conversation_id)?;

            let created_at = now();
            tx.execute(
                "INSERT INTO messages (conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, role.as_str(), content, created_at],
            )
            .map_err(db_err("Failed to insert message"))?;
            let message_id = tx.last_insert_rowid();

            {
                let mut stmt = tx
                    .prepare("INSERT INTO sources (message_id, content, source) VALUES (?1, ?2, ?3)")
                    .map_err(db_err("Failed to prepare source insert"))?;
                for source in &sources {
                    stmt.execute(params![message_id, source.content, source.source])
                        .map_err(db_err("Failed to insert source"))?;
                }
            }

            tx.commit().map_err(db_err("Failed to commit message"))?;

            debug!(
                conversation_id,
                message_id,
                sources = sources.len(),
                "Appended {} message",
                role.as_str()
            );

            Ok(StoredMessage {
                id: message_id,
                role,
                content,
                created_at: parse_time(&created_at)?,
                sources,
            })
        })
        .await
    }

    async fn list(&self) -> AppResult<Vec<ConversationSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.id, c.title, c.created_at, c.updated_at,
                            (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
                     FROM conversations c
                     ORDER BY c.activity DESC, c.id DESC",
                )
                .map_err(db_err("Failed to prepare conversation list"))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })
                .map_err(db_err("Failed to list conversations"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err("Failed to read conversation"))?;

            rows.into_iter()
                .map(|(id, title, created_at, updated_at, count)| {
                    Ok(ConversationSummary {
                        id,
                        title,
                        created_at: parse_time(&created_at)?,
                        updated_at: parse_time(&updated_at)?,
                        message_count: count as u32,
                    })
                })
                .collect::<AppResult<Vec<_>>>()
        })
        .await
    }

    async fn rename(&self, id: ConversationId, title: &str) -> AppResult<Conversation> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::History(
                "Conversation title must not be empty".to_string(),
            ));
        }

        self.with_conn(move |conn| {
            touch(conn, id)?;
            conn.execute(
                "UPDATE conversations SET title = ?1 WHERE id = ?2",
                params![title, id],
            )
            .map_err(db_err("Failed to rename conversation"))?;
            load_conversation(conn, id)
        })
        .await
    }

    async fn delete(&self, id: ConversationId) -> AppResult<()> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM conversations WHERE id = ?1", params![id])
                .map_err(db_err("Failed to delete conversation"))?;
            if deleted == 0 {
                return Err(not_found(id));
            }
            info!(id, "Deleted conversation");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> SqliteConversationStore {
        SqliteConversationStore::open(dir.path().join("history.sqlite"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let created = store.create("  Whales  ").await.unwrap();
        assert_eq!(created.title, "Whales");
        assert!(created.messages.is_empty());

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_append_keeps_order_and_sources() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let conversation = store.create("Whales").await.unwrap();

        store
            .append_message(conversation.id, Role::User, "What is a whale?", &[])
            .await
            .unwrap();
        let evidence = vec![
            EvidenceChunk::new("Whales live in the ocean.", Some("doc1".to_string())),
            EvidenceChunk::new("Sunny, 20C", None),
        ];
        let stored = store
            .append_message(conversation.id, Role::Assistant, "A big ocean animal.", &evidence)
            .await
            .unwrap();
        assert_eq!(stored.sources.len(), 2);

        let fetched = store.get(conversation.id).await.unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(fetched.messages[0].role, Role::User);
        assert_eq!(fetched.messages[1].content, "A big ocean animal.");
        assert_eq!(
            fetched.messages[1].sources,
            vec![
                SourceRecord {
                    content: "Whales live in the ocean.".to_string(),
                    source: Some("doc1".to_string()),
                },
                SourceRecord {
                    content: "Sunny, 20C".to_string(),
                    source: None,
                },
            ]
        );
        assert!(fetched.updated_at >= conversation.updated_at);
    }

    #[tokio::test]
    async fn test_list_most_recently_updated_first() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let first = store.create("first").await.unwrap();
        let second = store.create("second").await.unwrap();

        let ids: Vec<_> = store.list().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        store
            .append_message(first.id, Role::User, "hello", &[])
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[0].message_count, 1);
        assert_eq!(listed[1].message_count, 0);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let conversation = store.create("Whales").await.unwrap();
        store
            .append_message(
                conversation.id,
                Role::Assistant,
                "answer",
                &[EvidenceChunk::new("chunk", None)],
            )
            .await
            .unwrap();

        store.delete(conversation.id).await.unwrap();

        assert!(matches!(
            store.get(conversation.id).await,
            Err(AppError::NotFound(_))
        ));
        let orphans: i64 = store
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM messages) + (SELECT COUNT(*) FROM sources)",
                    [],
                    |row| row.get(0),
                )
                .map_err(db_err("count"))
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        assert!(matches!(store.get(42).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete(42).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            store.append_message(42, Role::User, "hi", &[]).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.rename(42, "new").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        let conversation = store.create("old").await.unwrap();

        let renamed = store.rename(conversation.id, "new").await.unwrap();
        assert_eq!(renamed.title, "new");
        assert!(store.create("   ").await.is_err());
    }
}
