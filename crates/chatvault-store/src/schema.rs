//! Database schema SQL.

/// Core tables: chats, messages.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL DEFAULT 'personal',
    last_activity TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S', 'now'))
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT UNIQUE,
    chat_id INTEGER NOT NULL REFERENCES chats(id),
    sender TEXT,
    content TEXT,
    timestamp TEXT,
    kind TEXT NOT NULL DEFAULT 'text',
    direction TEXT NOT NULL DEFAULT 'incoming',
    media_ref TEXT,
    raw_payload TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S', 'now')),
    CHECK (COALESCE(TRIM(content), '') <> '' OR COALESCE(TRIM(media_ref), '') <> '')
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_chats_last_activity ON chats(last_activity);
"#;

/// FTS5 shadow table. Not external-content: `chat_name` comes from a join.
pub const FTS_SCHEMA_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content, sender, chat_name,
    tokenize='unicode61'
);
"#;

/// Triggers to keep the FTS index in sync with the messages table.
pub const FTS_TRIGGERS_SQL: &str = r#"
CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content, sender, chat_name)
    SELECT new.id, COALESCE(new.content, ''), COALESCE(new.sender, ''), name
    FROM chats WHERE id = new.chat_id;
END;

CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
    DELETE FROM messages_fts WHERE rowid = old.id;
END;

CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
    DELETE FROM messages_fts WHERE rowid = old.id;
    INSERT INTO messages_fts(rowid, content, sender, chat_name)
    SELECT new.id, COALESCE(new.content, ''), COALESCE(new.sender, ''), name
    FROM chats WHERE id = new.chat_id;
END;
"#;

/// Re-insert index rows for messages that have none.
pub const FTS_BACKFILL_SQL: &str = r#"
INSERT INTO messages_fts(rowid, content, sender, chat_name)
SELECT m.id, COALESCE(m.content, ''), COALESCE(m.sender, ''), c.name
FROM messages m
JOIN chats c ON c.id = m.chat_id
WHERE m.id NOT IN (SELECT rowid FROM messages_fts);
"#;
