//! SQLite Store - durable rooms and documents
//!
//! A single connection guarded by a mutex; every call runs on the blocking
//! pool so the async runtime never waits on disk. The mutex also serializes
//! all document writes within the process.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::error::{StoreError, StoreResult};
use super::types::{from_millis, generate_room_id, Document, Room, DEFAULT_LANGUAGE, WELCOME_CODE};
use super::{RoomStore, MAX_ID_ATTEMPTS};

/// SQLite-backed room store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Self::init(conn, Some(path))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS documents (
                room_id TEXT PRIMARY KEY NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                code TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT 'python',
                updated_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Lock(e.to_string()))?;
            f(&mut guard)
        })
        .await?
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn insert_room(conn: &mut Connection) -> StoreResult<Room> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let now = Utc::now();
        let room = Room {
            id: generate_room_id(),
            created_at: now,
            updated_at: now,
        };
        let ms = now.timestamp_millis();

        let tx = conn.transaction()?;
        match tx.execute(
            "INSERT INTO rooms (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![room.id, ms],
        ) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                tracing::debug!(room_id = %room.id, "Room id collision, retrying");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        tx.execute(
            "INSERT INTO documents (room_id, code, language, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![room.id, WELCOME_CODE, DEFAULT_LANGUAGE, ms],
        )?;
        tx.commit()?;

        return Ok(room);
    }

    Err(StoreError::IdExhausted(MAX_ID_ATTEMPTS))
}

#[async_trait]
impl RoomStore for SqliteStore {
    async fn create_room(&self) -> StoreResult<Room> {
        let room = self.with_conn(insert_room).await?;
        tracing::info!(room_id = %room.id, "Room created");
        Ok(room)
    }

    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        let room_id = room_id.to_string();
        self.with_conn(move |conn| {
            let room = conn
                .query_row(
                    "SELECT id, created_at, updated_at FROM rooms WHERE id = ?1",
                    params![room_id],
                    |row| {
                        Ok(Room {
                            id: row.get(0)?,
                            created_at: from_millis(row.get(1)?),
                            updated_at: from_millis(row.get(2)?),
                        })
                    },
                )
                .optional()?;
            Ok(room)
        })
        .await
    }

    async fn load_document(&self, room_id: &str) -> StoreResult<Option<Document>> {
        let room_id = room_id.to_string();
        self.with_conn(move |conn| {
            let doc = conn
                .query_row(
                    "SELECT room_id, code, language, updated_at FROM documents WHERE room_id = ?1",
                    params![room_id],
                    |row| {
                        Ok(Document {
                            room_id: row.get(0)?,
                            code: row.get(1)?,
                            language: row.get(2)?,
                            updated_at: from_millis(row.get(3)?),
                        })
                    },
                )
                .optional()?;
            Ok(doc)
        })
        .await
    }

    async fn save_document(
        &self,
        room_id: &str,
        code: &str,
        language: &str,
    ) -> StoreResult<Document> {
        let document = Document::new(room_id, code, language);
        let row = document.clone();

        self.with_conn(move |conn| {
            let ms = row.updated_at.timestamp_millis();
            let tx = conn.transaction()?;

            let touched = tx.execute(
                "UPDATE rooms SET updated_at = ?2 WHERE id = ?1",
                params![row.room_id, ms],
            )?;
            if touched == 0 {
                return Err(StoreError::RoomNotFound(row.room_id));
            }

            tx.execute(
                "INSERT INTO documents (room_id, code, language, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(room_id) DO UPDATE SET
                    code = excluded.code,
                    language = excluded.language,
                    updated_at = excluded.updated_at",
                params![row.room_id, row.code, row.language, ms],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_and_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        let room = store.create_room().await.unwrap();

        let fetched = store.get_room(&room.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, room.id);

        let doc = store.load_document(&room.id).await.unwrap().unwrap();
        assert_eq!(doc.code, WELCOME_CODE);
        assert_eq!(doc.language, DEFAULT_LANGUAGE);
    }

    #[tokio::test]
    async fn test_missing_room() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.room_exists("ghost").await.unwrap());
        assert!(store.load_document("ghost").await.unwrap().is_none());

        let result = store.save_document("ghost", "x = 1", "python").await;
        assert!(matches!(result, Err(StoreError::RoomNotFound(_))));
        assert!(store.load_document("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        let room = store.create_room().await.unwrap();

        store.save_document(&room.id, "x = 1", "python").await.unwrap();
        let saved = store
            .save_document(&room.id, "const x = 2;", "javascript")
            .await
            .unwrap();
        assert_eq!(saved.code, "const x = 2;");

        let doc = store.load_document(&room.id).await.unwrap().unwrap();
        assert_eq!(doc.code, "const x = 2;");
        assert_eq!(doc.language, "javascript");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("pairsync.db");

        let room_id = {
            let store = SqliteStore::open(&path).unwrap();
            let room = store.create_room().await.unwrap();
            store.save_document(&room.id, "print(1)", "python").await.unwrap();
            room.id
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let doc = store.load_document(&room_id).await.unwrap().unwrap();
        assert_eq!(doc.code, "print(1)");
    }

    #[tokio::test]
    async fn test_concurrent_writes_are_serialized() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let room = store.create_room().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let id = room.id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save_document(&id, &format!("value = {}", i), "python")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let doc = store.load_document(&room.id).await.unwrap().unwrap();
        assert!(doc.code.starts_with("value = "));
    }
}
