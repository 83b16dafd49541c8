use rusqlite::{Connection, params};
use std::path::Path;

use crate::domain::message::{MessageRecord, SenderCount};
use crate::error::StorageError;
use crate::store::repo::MessageRepository;

pub struct SqliteRepo {
    conn: Connection,
}

impl SqliteRepo {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let repo = Self {
            conn: Connection::open_in_memory()?,
        };
        repo.ensure_schema()?;
        Ok(repo)
    }
}

impl MessageRepository for SqliteRepo {
    fn ensure_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                message_id    TEXT,
                from_address  TEXT,
                UNIQUE(message_id)
            );
            "#,
        )?;
        Ok(())
    }

    fn insert_pending(&self, ids: &[String]) -> Result<usize, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO messages (message_id, from_address)
                VALUES (?1, NULL)
                "#,
            )?;

            for id in ids {
                inserted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn list_pending(&self) -> Result<Vec<MessageRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT message_id, from_address
            FROM messages
            WHERE from_address IS NULL
            ORDER BY rowid
            "#,
        )?;

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();

        while let Some(r) = rows.next()? {
            out.push(MessageRecord {
                message_id: r.get(0)?,
                sender_address: r.get(1)?,
            });
        }
        Ok(out)
    }

    fn set_sender(&self, message_id: &str, sender_address: &str) -> Result<(), StorageError> {
        self.conn.execute(
            r#"UPDATE messages SET from_address=?1 WHERE message_id=?2"#,
            params![sender_address, message_id],
        )?;
        Ok(())
    }

    fn aggregate_by_sender(&self) -> Result<Vec<SenderCount>, StorageError> {
        // Ties keep the order in which each sender's first row was stored.
        let mut stmt = self.conn.prepare(
            r#"
            SELECT COUNT(*) AS total, from_address
            FROM messages
            GROUP BY from_address
            ORDER BY total DESC, MIN(rowid) ASC
            "#,
        )?;

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();

        while let Some(r) = rows.next()? {
            out.push(SenderCount {
                count: r.get::<_, i64>(0)? as u64,
                sender_address: r.get(1)?,
            });
        }
        Ok(out)
    }
}
