//! SQLite store for captured chats and messages, with an FTS5 index.
//!
//! Writes are idempotent on the client-assigned external id: a re-observed
//! message merges field by field (see [`crate::merge`]) instead of
//! duplicating the row.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::merge::{merge_media_ref, merge_timestamp};
use crate::schema::{FTS_BACKFILL_SQL, FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL, SCHEMA_SQL};
use crate::types::*;
use chatvault_core::timestamp::now_canonical;
use chatvault_core::{CapturedMessage, Direction, Error, Result};

/// SQLite store holding chats, messages and the full-text index.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/chatvault.db`.
    /// The FTS index is reconciled against the messages table on every open.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("chatvault.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let fixed = store.reconcile_fts()?;
        if fixed.backfilled > 0 || fixed.pruned > 0 {
            info!(
                "FTS index reconciled: {} backfilled, {} pruned",
                fixed.backfilled, fixed.pruned
            );
        }

        let stats = store.get_stats()?;
        info!(
            "SqliteStore initialized: {} chats, {} messages, path={}",
            stats.chat_count,
            stats.message_count,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}\n{}", SCHEMA_SQL, FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    /// Path of the database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Chats
    // ---------------------------------------------------------------

    /// Create the chat if absent, otherwise refresh its last activity and type.
    /// Returns the chat id, stable across calls.
    pub fn upsert_chat(&self, name: &str, chat_type: ChatType) -> Result<i64> {
        let conn = self.conn.lock();
        Self::resolve_chat(&conn, name, Some(chat_type))
    }

    /// Upsert helper shared with `insert_messages`. `None` keeps the stored type.
    fn resolve_chat(conn: &Connection, name: &str, chat_type: Option<ChatType>) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::ChatResolution("empty chat name".into()));
        }
        let now = now_canonical();

        conn.prepare_cached(
            "INSERT INTO chats (name, type, last_activity) VALUES (?1, COALESCE(?2, 'personal'), ?3)
             ON CONFLICT(name) DO UPDATE SET
                last_activity = excluded.last_activity,
                type = COALESCE(?2, type)",
        )
        .and_then(|mut stmt| stmt.execute(params![name, chat_type.map(|t| t.as_str()), now]))
        .map_err(|e| Error::ChatResolution(format!("{}: {}", name, e)))?;

        conn.prepare_cached("SELECT id FROM chats WHERE name = ?1")
            .and_then(|mut stmt| stmt.query_row(params![name], |row| row.get(0)))
            .map_err(|e| Error::ChatResolution(format!("{}: {}", name, e)))
    }

    /// All chats with message counts, most recent activity first.
    pub fn list_chats(&self) -> Result<Vec<Chat>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT c.*, COUNT(m.id) AS message_count
                 FROM chats c
                 LEFT JOIN messages m ON m.chat_id = c.id
                 GROUP BY c.id
                 ORDER BY c.last_activity DESC, c.id DESC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_chat)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Look up a chat by its display name.
    pub fn get_chat_by_name(&self, name: &str) -> Result<Option<Chat>> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached(
            "SELECT c.*, (SELECT COUNT(*) FROM messages m WHERE m.chat_id = c.id) AS message_count
             FROM chats c WHERE c.name = ?1",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .query_row(params![name.trim()], Self::row_to_chat)
        .optional()
        .map_err(|e| Error::Database(e.to_string()));
        result
    }

    // ---------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------

    /// Persist a batch of messages for one chat.
    ///
    /// The whole batch runs in one transaction with a savepoint per message,
    /// so a failing message is rolled back and skipped without affecting the
    /// rest. Failing to resolve the chat aborts the batch.
    pub fn insert_messages(
        &self,
        chat_name: &str,
        messages: &[CapturedMessage],
    ) -> Result<InsertResult> {
        let mut conn = self.conn.lock();
        let mut tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        let chat_id = Self::resolve_chat(&tx, chat_name, infer_chat_type(messages))?;

        let mut inserted = 0;
        for (idx, msg) in messages.iter().enumerate() {
            let mut sp = tx
                .savepoint()
                .map_err(|e| Error::Database(e.to_string()))?;
            match Self::upsert_message(&sp, chat_id, msg) {
                Ok(is_new) => {
                    sp.commit().map_err(|e| Error::Database(e.to_string()))?;
                    if is_new {
                        inserted += 1;
                    }
                }
                Err(e) => {
                    if let Err(rb) = sp.rollback() {
                        warn!("Rollback of message {} in '{}' failed: {}", idx, chat_name, rb);
                    }
                    warn!("Skipping message {} in '{}': {}", idx, chat_name, e);
                }
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        debug!(
            "Stored batch for '{}': {}/{} new",
            chat_name,
            inserted,
            messages.len()
        );
        Ok(InsertResult {
            chat_id,
            inserted,
            total: messages.len(),
        })
    }

    /// Insert one message or merge it into the row with the same external id.
    /// Returns whether a new row was created.
    fn upsert_message(conn: &Connection, chat_id: i64, msg: &CapturedMessage) -> Result<bool> {
        let conflict = |e: rusqlite::Error| Error::PersistenceConflict(e.to_string());

        if let Some(external_id) = msg.external_id() {
            let existing: Option<(i64, Option<String>, Option<String>)> = conn
                .prepare_cached("SELECT id, timestamp, media_ref FROM messages WHERE external_id = ?1")
                .and_then(|mut stmt| {
                    stmt.query_row(params![external_id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })
                    .optional()
                })
                .map_err(conflict)?;

            if let Some((id, stored_ts, stored_media)) = existing {
                let timestamp = merge_timestamp(stored_ts.as_deref(), non_empty(&msg.timestamp));
                let media_ref = merge_media_ref(stored_media.as_deref(), msg.media());
                if timestamp != stored_ts || media_ref != stored_media {
                    conn.prepare_cached(
                        "UPDATE messages SET timestamp = ?1, media_ref = ?2 WHERE id = ?3",
                    )
                    .and_then(|mut stmt| stmt.execute(params![timestamp, media_ref, id]))
                    .map_err(conflict)?;
                }
                return Ok(false);
            }
        }

        conn.prepare_cached(
            "INSERT INTO messages
                (external_id, chat_id, sender, content, timestamp, kind, direction, media_ref, raw_payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .and_then(|mut stmt| {
            stmt.execute(params![
                msg.external_id(),
                chat_id,
                non_empty(&msg.sender),
                non_empty(&msg.content),
                non_empty(&msg.timestamp),
                msg.kind.as_str(),
                msg.direction.as_str(),
                msg.media(),
                msg.raw_snapshot(),
            ])
        })
        .map_err(conflict)?;
        Ok(true)
    }

    /// Messages of one chat in chronological order.
    pub fn get_messages(&self, chat_id: i64, limit: usize, offset: usize) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM messages WHERE chat_id = ?1
                 ORDER BY replace(timestamp, ' ', 'T') ASC, id ASC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![chat_id, limit as i64, offset as i64], Self::row_to_message)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Delete one message. The index row goes with it via trigger.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Full-text search (FTS5)
    // ---------------------------------------------------------------

    /// Prefix search over content, sender and chat name, newest first.
    ///
    /// Every token must match. Never fails: a query FTS5 rejects is logged
    /// and yields no results.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Vec::new();
        }

        match self.run_search(&fts_query, limit) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }

    fn run_search(&self, fts_query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock();
        let sql = "SELECT m.*, c.name AS chat_name \
                   FROM messages_fts \
                   JOIN messages m ON m.id = messages_fts.rowid \
                   JOIN chats c ON c.id = m.chat_id \
                   WHERE messages_fts MATCH ?1 \
                   ORDER BY replace(m.timestamp, ' ', 'T') DESC, m.id DESC \
                   LIMIT ?2";

        let syntax = |e: rusqlite::Error| Error::SearchSyntax(e.to_string());
        let mut stmt = conn.prepare_cached(sql).map_err(syntax)?;
        let rows = stmt
            .query_map(params![fts_query, limit as i64], |row| {
                Ok(SearchHit {
                    message: Self::row_to_message(row)?,
                    chat_name: row.get("chat_name")?,
                })
            })
            .map_err(syntax)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(syntax)
    }

    /// Sanitize a user query for FTS5 MATCH syntax.
    /// Each token becomes a quoted prefix term; terms are joined with AND.
    fn sanitize_fts_query(query: &str) -> String {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.replace('"', ""))
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"*", t))
            .collect();
        tokens.join(" AND ")
    }

    /// Backfill index rows for messages that lack one and prune index rows
    /// whose message is gone.
    pub fn reconcile_fts(&self) -> Result<FtsReconciliation> {
        let conn = self.conn.lock();
        let pruned = conn
            .execute(
                "DELETE FROM messages_fts WHERE rowid NOT IN (SELECT id FROM messages)",
                [],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let backfilled = conn
            .execute(FTS_BACKFILL_SQL, [])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(FtsReconciliation { backfilled, pruned })
    }

    /// Drop and repopulate the whole index. Returns the number of indexed rows.
    pub fn rebuild_fts(&self) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DELETE FROM messages_fts", [])
            .map_err(|e| Error::Database(e.to_string()))?;
        let count = tx
            .execute(FTS_BACKFILL_SQL, [])
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        info!("FTS index rebuilt: {} rows", count);
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    /// Get store statistics.
    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<i64> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(|e| Error::Database(e.to_string()))
        };
        let chat_count = count("SELECT COUNT(*) FROM chats")?;
        let message_count = count("SELECT COUNT(*) FROM messages")?;
        let indexed_count = count("SELECT COUNT(*) FROM messages_fts")?;
        let latest_message: Option<String> = conn
            .query_row(
                "SELECT timestamp FROM messages WHERE timestamp IS NOT NULL
                 ORDER BY replace(timestamp, ' ', 'T') DESC, id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            chat_count,
            message_count,
            latest_message,
            indexed_count,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
        Ok(Chat {
            id: row.get("id")?,
            name: row.get("name")?,
            chat_type: ChatType::from_name(&row.get::<_, String>("type")?),
            last_activity: row.get("last_activity")?,
            created_at: row.get("created_at")?,
            message_count: row.get("message_count")?,
        })
    }

    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
        Ok(StoredMessage {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            chat_id: row.get("chat_id")?,
            sender: row.get("sender")?,
            content: row.get("content")?,
            timestamp: row.get("timestamp")?,
            kind: row.get("kind")?,
            direction: row.get("direction")?,
            media_ref: row.get("media_ref")?,
            raw_payload: row.get("raw_payload")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Group evidence from a batch: more than one distinct incoming sender.
/// A single counterparty proves nothing, so the stored type is kept.
fn infer_chat_type(messages: &[CapturedMessage]) -> Option<ChatType> {
    let mut senders = messages
        .iter()
        .filter(|m| m.direction == Direction::Incoming)
        .map(|m| m.sender.trim())
        .filter(|s| !s.is_empty());
    let first = senders.next()?;
    senders.any(|s| s != first).then_some(ChatType::Group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatvault_core::MessageKind;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn text(id: &str, content: &str, timestamp: &str) -> CapturedMessage {
        CapturedMessage {
            id: Some(id.to_string()),
            sender: "Alice".into(),
            content: content.into(),
            timestamp: timestamp.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_is_idempotent() {
        let (store, _dir) = test_store();
        let batch = vec![
            text("a1", "first", "2025-01-01T10:00:00"),
            text("a2", "second", "2025-01-01T10:01:00"),
        ];

        let first = store.insert_messages("Family", &batch).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.total, 2);

        let second = store.insert_messages("Family", &batch).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.total, 2);
        assert_eq!(second.chat_id, first.chat_id);
        assert_eq!(store.get_stats().unwrap().message_count, 2);
    }

    #[test]
    fn test_messages_without_id_are_not_deduplicated() {
        let (store, _dir) = test_store();
        let msg = CapturedMessage {
            content: "no id".into(),
            ..Default::default()
        };
        store.insert_messages("Bob", &[msg.clone()]).unwrap();
        let result = store.insert_messages("Bob", &[msg]).unwrap();
        assert_eq!(result.inserted, 1);
    }

    #[test]
    fn test_timestamp_merge_on_conflict() {
        let (store, _dir) = test_store();
        let chat_id = store
            .insert_messages("Bob", &[text("t1", "hi", "2025-01-01T10:00:00")])
            .unwrap()
            .chat_id;
        store
            .insert_messages("Bob", &[text("t1", "hi", "10:05 AM")])
            .unwrap();
        let msgs = store.get_messages(chat_id, 10, 0).unwrap();
        assert_eq!(msgs[0].timestamp.as_deref(), Some("2025-01-01T10:00:00"));

        // Malformed first, then upgraded by a canonical value.
        store
            .insert_messages("Bob", &[text("t2", "later", "2025-01-01 10:06")])
            .unwrap();
        store
            .insert_messages("Bob", &[text("t2", "later", "2025-01-01T10:06:30")])
            .unwrap();
        let msgs = store.get_messages(chat_id, 10, 0).unwrap();
        let t2 = msgs
            .iter()
            .find(|m| m.external_id.as_deref() == Some("t2"))
            .unwrap();
        assert_eq!(t2.timestamp.as_deref(), Some("2025-01-01T10:06:30"));
    }

    #[test]
    fn test_media_ref_never_overwritten() {
        let (store, _dir) = test_store();
        let mut msg = CapturedMessage {
            id: Some("m1".into()),
            content: "[Image]".into(),
            kind: MessageKind::Image,
            ..Default::default()
        };
        let chat_id = store.insert_messages("Bob", &[msg.clone()]).unwrap().chat_id;

        msg.media_ref = Some("/media/first.jpg".into());
        store.insert_messages("Bob", &[msg.clone()]).unwrap();
        msg.media_ref = Some("/media/second.jpg".into());
        store.insert_messages("Bob", &[msg]).unwrap();

        let msgs = store.get_messages(chat_id, 10, 0).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].media_ref.as_deref(), Some("/media/first.jpg"));
        assert_eq!(msgs[0].kind, "image");
    }

    #[test]
    fn test_upsert_chat_is_stable() {
        let (store, _dir) = test_store();
        let id = store.upsert_chat("Team", ChatType::Group).unwrap();
        store
            .conn
            .lock()
            .execute(
                "UPDATE chats SET last_activity = '2000-01-01T00:00:00' WHERE id = ?1",
                params![id],
            )
            .unwrap();

        let again = store.upsert_chat("Team", ChatType::Group).unwrap();
        assert_eq!(id, again);

        let chat = store.get_chat_by_name("Team").unwrap().unwrap();
        assert_eq!(chat.chat_type, ChatType::Group);
        let activity = chat.last_activity.unwrap();
        assert!(activity.as_str() > "2000-01-01T00:00:00");

        // Batches do not reset the chat type.
        store
            .insert_messages("Team", &[text("g1", "hello team", "")])
            .unwrap();
        let chat = store.get_chat_by_name("Team").unwrap().unwrap();
        assert_eq!(chat.chat_type, ChatType::Group);
        assert_eq!(chat.message_count, 1);
    }

    #[test]
    fn test_empty_chat_name_is_fatal() {
        let (store, _dir) = test_store();
        let err = store
            .insert_messages("  ", &[text("x", "hi", "")])
            .unwrap_err();
        assert!(matches!(err, Error::ChatResolution(_)));
    }

    #[test]
    fn test_partial_failure_isolated() {
        let (store, _dir) = test_store();
        let mut batch: Vec<CapturedMessage> = (1..=5)
            .map(|i| text(&format!("p{}", i), &format!("message {}", i), ""))
            .collect();
        // Neither content nor media: rejected by the CHECK constraint.
        batch[2].content = String::new();

        let result = store.insert_messages("Bob", &batch).unwrap();
        assert_eq!(result.inserted, 4);
        assert_eq!(result.total, 5);
    }

    #[test]
    fn test_search_prefix_and() {
        let (store, _dir) = test_store();
        store
            .insert_messages(
                "Bob",
                &[
                    text("s1", "hello world", "2025-01-01T10:00:00"),
                    text("s2", "hello there", "2025-01-01T11:00:00"),
                    text("s3", "world peace", "2025-01-01T12:00:00"),
                ],
            )
            .unwrap();

        let hits = store.search("hel wor", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message.content.as_deref(), Some("hello world"));
        assert_eq!(hits[0].chat_name, "Bob");

        // Newest first.
        let hits = store.search("hello", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].message.external_id.as_deref(), Some("s2"));

        // Chat name is indexed too.
        assert_eq!(store.search("bob", 10).len(), 3);
    }

    #[test]
    fn test_search_orders_mixed_timestamp_forms() {
        let (store, _dir) = test_store();
        store
            .insert_messages(
                "Bob",
                &[
                    text("t1", "report early", "2025-01-01T01:00:00"),
                    text("t2", "report late", "2025-01-01 23:00"),
                    text("t3", "report prior day", "2024-12-31 22:00"),
                ],
            )
            .unwrap();

        let order: Vec<_> = store
            .search("report", 10)
            .into_iter()
            .map(|h| h.message.external_id.unwrap())
            .collect();
        assert_eq!(order, vec!["t2", "t1", "t3"]);

        let chat = store.get_chat_by_name("Bob").unwrap().unwrap();
        let chronological: Vec<_> = store
            .get_messages(chat.id, 10, 0)
            .unwrap()
            .into_iter()
            .map(|m| m.external_id.unwrap())
            .collect();
        assert_eq!(chronological, vec!["t3", "t1", "t2"]);
        assert_eq!(
            store.get_stats().unwrap().latest_message.as_deref(),
            Some("2025-01-01 23:00")
        );
    }

    #[test]
    fn test_batch_with_several_senders_marks_group() {
        let (store, _dir) = test_store();
        let carol = CapturedMessage {
            sender: "Carol".into(),
            ..text("g2", "me too", "")
        };
        store
            .insert_messages("Direct", &[text("p1", "hi", ""), text("p2", "again", "")])
            .unwrap();
        store
            .insert_messages("Team", &[text("g1", "hi all", ""), carol])
            .unwrap();
        // A later single-sender batch does not demote the chat.
        store
            .insert_messages("Team", &[text("g3", "ping", "")])
            .unwrap();

        let direct = store.get_chat_by_name("Direct").unwrap().unwrap();
        assert_eq!(direct.chat_type, ChatType::Personal);
        let team = store.get_chat_by_name("Team").unwrap().unwrap();
        assert_eq!(team.chat_type, ChatType::Group);
    }

    #[test]
    fn test_search_never_fails() {
        let (store, _dir) = test_store();
        store
            .insert_messages("Bob", &[text("q1", "hello", "")])
            .unwrap();

        assert!(store.search("", 10).is_empty());
        assert!(store.search("\"\"", 10).is_empty());
        assert!(store.search("\"(((", 10).is_empty());
        assert_eq!(store.search("\"hello", 10).len(), 1);
    }

    #[test]
    fn test_reconcile_and_rebuild_fts() {
        let (store, _dir) = test_store();
        store
            .insert_messages("Bob", &[text("r1", "alpha", ""), text("r2", "beta", "")])
            .unwrap();

        {
            let conn = store.conn.lock();
            conn.execute("DELETE FROM messages_fts", []).unwrap();
            conn.execute(
                "INSERT INTO messages_fts(rowid, content, sender, chat_name) VALUES (999, 'ghost', '', '')",
                [],
            )
            .unwrap();
        }
        assert!(store.search("alpha", 10).is_empty());

        let fixed = store.reconcile_fts().unwrap();
        assert_eq!(fixed.backfilled, 2);
        assert_eq!(fixed.pruned, 1);
        assert_eq!(store.search("alpha", 10).len(), 1);

        assert_eq!(store.rebuild_fts().unwrap(), 2);
        assert_eq!(store.get_stats().unwrap().indexed_count, 2);
    }

    #[test]
    fn test_list_chats_and_pagination() {
        let (store, _dir) = test_store();
        let batch: Vec<CapturedMessage> = (0..5)
            .map(|i| text(&format!("l{}", i), "x", &format!("2025-01-01T10:0{}:00", i)))
            .collect();
        let chat_id = store.insert_messages("Bob", &batch).unwrap().chat_id;
        store.upsert_chat("Carol", ChatType::Personal).unwrap();

        let chats = store.list_chats().unwrap();
        assert_eq!(chats.len(), 2);
        let bob = chats.iter().find(|c| c.name == "Bob").unwrap();
        assert_eq!(bob.message_count, 5);

        let page = store.get_messages(chat_id, 2, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].external_id.as_deref(), Some("l2"));
    }

    #[test]
    fn test_delete_message_and_stats() {
        let (store, _dir) = test_store();
        let outgoing = CapturedMessage {
            direction: Direction::Outgoing,
            ..text("d1", "bye", "2025-02-01T09:00:00")
        };
        let chat_id = store
            .insert_messages("Bob", &[outgoing, text("d2", "hi", "2025-01-01T09:00:00")])
            .unwrap()
            .chat_id;

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.chat_count, 1);
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.latest_message.as_deref(), Some("2025-02-01T09:00:00"));

        let msgs = store.get_messages(chat_id, 10, 0).unwrap();
        assert_eq!(msgs[1].direction, "outgoing");
        assert!(store.delete_message(msgs[1].id).unwrap());
        assert!(!store.delete_message(msgs[1].id).unwrap());
        assert!(store.search("bye", 10).is_empty());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store
                .insert_messages("Bob", &[text("o1", "persisted", "")])
                .unwrap();
        }
        let store = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.search("persisted", 10).len(), 1);
    }
}
