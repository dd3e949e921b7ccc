// Client store - persisted per-client key/value state
//
// Holds what a browser would keep in local storage, scoped by client id:
//   theme          light/dark preference
//   question_draft autosaved composer state (JSON)
//   featured_html  last rendered featured fragment
//
// Lives in its own SQLite file, separate from the content backend.
// Operations are single-row statements, so they run inline on the caller.

use anyhow::Context;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub const THEME_KEY: &str = "theme";
pub const DRAFT_KEY: &str = "question_draft";
pub const FEATURED_KEY: &str = "featured_html";

const CLIENT_ID_LEN: usize = 24;

/// Same layout as SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ')`, so text order is time order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Opaque per-browser identifier carried in the `qa_client` cookie
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CLIENT_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Accept a cookie value only if it looks like one we issued
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == CLIENT_ID_LEN && raw.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum StoreError {
    Database(String),
    Encoding(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "client store error: {}", msg),
            StoreError::Encoding(msg) => write!(f, "client store encoding error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

#[derive(Clone)]
pub struct ClientStore {
    pool: Pool<SqliteConnectionManager>,
}

impl ClientStore {
    pub fn open(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout=5000;"));
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .context("Failed to build client store pool")?;

        Self::from_pool(pool)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .context("Failed to build in-memory client store")?;

        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> anyhow::Result<Self> {
        let conn = pool.get()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS client_state (
                client_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (client_id, key)
            );
            "#,
        )
        .context("Failed to initialize client store schema")?;
        drop(conn);
        Ok(Self { pool })
    }

    pub fn get(&self, client: &ClientId, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM client_state WHERE client_id = ?1 AND key = ?2",
                params![client.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, client: &ClientId, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO client_state (client_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(client_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![client.as_str(), key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, client: &ClientId, key: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM client_state WHERE client_id = ?1 AND key = ?2",
            params![client.as_str(), key],
        )?;
        Ok(())
    }

    /// Drop every row of clients whose newest write is older than `cutoff`
    pub fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM client_state WHERE client_id IN (
                SELECT client_id FROM client_state
                GROUP BY client_id
                HAVING MAX(updated_at) < ?1
             )",
            params![cutoff.format(TIMESTAMP_FORMAT).to_string()],
        )?;
        Ok(removed)
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        client: &ClientId,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(client, key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(
        &self,
        client: &ClientId,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(client, key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_scoped_per_client() {
        let store = ClientStore::in_memory().unwrap();
        let a = ClientId::generate();
        let b = ClientId::generate();

        store.set(&a, THEME_KEY, "dark").unwrap();
        assert_eq!(store.get(&a, THEME_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(store.get(&b, THEME_KEY).unwrap(), None);

        store.set(&a, THEME_KEY, "light").unwrap();
        assert_eq!(store.get(&a, THEME_KEY).unwrap().as_deref(), Some("light"));

        store.remove(&a, THEME_KEY).unwrap();
        assert_eq!(store.get(&a, THEME_KEY).unwrap(), None);
    }

    #[test]
    fn test_json_values() {
        let store = ClientStore::in_memory().unwrap();
        let client = ClientId::generate();

        store
            .set_json(&client, DRAFT_KEY, &vec!["গতি".to_string()])
            .unwrap();
        let tags: Option<Vec<String>> = store.get_json(&client, DRAFT_KEY).unwrap();
        assert_eq!(tags, Some(vec!["গতি".to_string()]));

        store.set(&client, DRAFT_KEY, "{not json").unwrap();
        let broken: Result<Option<Vec<String>>, _> = store.get_json(&client, DRAFT_KEY);
        assert!(matches!(broken, Err(StoreError::Encoding(_))));
    }

    #[test]
    fn test_prune_idle_keeps_recent_clients() {
        let store = ClientStore::in_memory().unwrap();
        let idle = ClientId::generate();
        let active = ClientId::generate();
        store.set(&idle, THEME_KEY, "dark").unwrap();
        store.set(&idle, FEATURED_KEY, "<ol></ol>").unwrap();
        store.set(&active, THEME_KEY, "light").unwrap();

        let age = |client: &ClientId, key: &str| {
            store
                .pool
                .get()
                .unwrap()
                .execute(
                    "UPDATE client_state SET updated_at = '2020-01-01T00:00:00.000Z'
                     WHERE client_id = ?1 AND key = ?2",
                    params![client.as_str(), key],
                )
                .unwrap();
        };
        age(&idle, THEME_KEY);
        age(&idle, FEATURED_KEY);

        let cutoff = Utc::now() - chrono::Duration::days(30);
        assert_eq!(store.prune_idle(cutoff).unwrap(), 2);
        assert_eq!(store.get(&idle, THEME_KEY).unwrap(), None);
        assert_eq!(store.get(&active, THEME_KEY).unwrap().as_deref(), Some("light"));

        // One recent write keeps all of a client's rows
        age(&active, THEME_KEY);
        store.set(&active, DRAFT_KEY, "{}").unwrap();
        assert_eq!(store.prune_idle(cutoff).unwrap(), 0);
        assert_eq!(store.get(&active, THEME_KEY).unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn test_client_id_parse() {
        let id = ClientId::generate();
        assert_eq!(ClientId::parse(id.as_str()), Some(id.clone()));
        assert_eq!(ClientId::parse("short"), None);
        assert_eq!(ClientId::parse(&"x".repeat(23).chars().chain(['!']).collect::<String>()), None);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = std::env::temp_dir().join(format!("physics-qa-store-{}", ClientId::generate()));
        let path = dir.join("state.db");
        let client = ClientId::generate();

        {
            let store = ClientStore::open(&path).unwrap();
            store.set(&client, FEATURED_KEY, "<ul></ul>").unwrap();
        }
        let reopened = ClientStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(&client, FEATURED_KEY).unwrap().as_deref(),
            Some("<ul></ul>")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
