use crate::errors::ToolError;
use crate::services::session::ChatMessage;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY,
    title TEXT UNIQUE,
    messages TEXT
)";

/// Saved conversations keyed by title, one SQLite table.
#[derive(Clone)]
pub struct ConversationStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl ConversationStore {
    pub fn open(path: &Path) -> Result<Self, ToolError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|err| {
            ToolError::config(format!(
                "Failed to open conversation store {}: {}",
                path.display(),
                err
            ))
            .with_hint("Set COPILOT_DB_PATH to a writable location.")
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, ToolError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, ToolError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, ToolError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ToolError::internal("Conversation store lock poisoned"))?;
        Ok(f(&conn)?)
    }

    pub fn list_titles(&self) -> Result<Vec<String>, ToolError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT title FROM conversations ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let titles = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(titles)
        })
    }

    /// Inserts or replaces the conversation stored under `title`.
    pub fn save(&self, title: &str, messages: &[ChatMessage]) -> Result<(), ToolError> {
        let payload = serde_json::to_string(messages).map_err(|err| {
            ToolError::internal(format!("Failed to serialize conversation: {}", err))
        })?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO conversations (title, messages) VALUES (?1, ?2)",
                params![title, payload],
            )
        })?;
        Ok(())
    }

    /// Messages stored under `title`, or an empty list when there are none.
    pub fn load(&self, title: &str) -> Result<Vec<ChatMessage>, ToolError> {
        let payload: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT messages FROM conversations WHERE title = ?1",
                params![title],
                |row| row.get(0),
            )
            .optional()
        })?;
        match payload {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                ToolError::internal(format!(
                    "Stored conversation '{}' is corrupt: {}",
                    title, err
                ))
            }),
        }
    }

    /// Returns whether a conversation was removed.
    pub fn delete(&self, title: &str) -> Result<bool, ToolError> {
        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM conversations WHERE title = ?1", params![title])
        })?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_round_trip_and_replace() {
        let store = ConversationStore::open_in_memory().expect("store");
        let first = vec![ChatMessage::user("Show Windows devices")];
        store.save("Windows devices", &first).expect("save");
        assert_eq!(store.load("Windows devices").expect("load"), first);

        let second = vec![
            ChatMessage::user("Show Windows devices"),
            ChatMessage::assistant("There are 3 devices."),
        ];
        store.save("Windows devices", &second).expect("replace");
        assert_eq!(store.load("Windows devices").expect("load"), second);
        assert_eq!(store.list_titles().expect("titles"), vec!["Windows devices"]);
    }

    #[test]
    fn missing_title_loads_empty_and_delete_reports_absence() {
        let store = ConversationStore::open_in_memory().expect("store");
        assert!(store.load("nope").expect("load").is_empty());
        assert!(!store.delete("nope").expect("delete"));
        store.save("a", &[]).expect("save");
        assert!(store.delete("a").expect("delete"));
        assert!(store.list_titles().expect("titles").is_empty());
    }

    #[test]
    fn file_backed_store_reports_its_path() {
        let dir = std::env::temp_dir().join(format!("graph-copilot-store-{}", uuid::Uuid::new_v4()));
        let db = dir.join("conversations.db");
        let store = ConversationStore::open(&db).expect("store");
        assert_eq!(store.path(), Some(db.as_path()));
        assert!(ConversationStore::open_in_memory().expect("store").path().is_none());
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
