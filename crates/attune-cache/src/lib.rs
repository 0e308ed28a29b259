//! Persisted local result cache: an append-only, size-capped log of the
//! last delivered results per modality. Written after each dispatch and
//! never read back by the pipeline except to enforce the cap.

mod error;

pub use error::CacheError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use attune_core::ids::SessionId;
use attune_core::model::{AnalysisResult, Modality};

/// Entries retained per modality.
pub const RESULTS_PER_MODALITY: usize = 100;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;";

const CREATE_TABLES: &str = "CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    modality TEXT NOT NULL,
    session_id TEXT,
    payload TEXT NOT NULL,
    arrived_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_results_modality ON results(modality);";

/// Thread-safe SQLite-backed cache.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Send).
pub struct ResultCache {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl ResultCache {
    /// Open or create a cache at the given path.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io(format!("create dir: {e}")))?;
        }
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        conn.execute_batch(PRAGMAS)
            .map_err(|e| CacheError::Database(format!("pragmas: {e}")))?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| CacheError::Database(format!("schema: {e}")))?;
        info!(path = %path.display(), "result cache opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory cache (for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| CacheError::Database(format!("schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one delivered result under its modality, then trim that
    /// modality back to the last [`RESULTS_PER_MODALITY`] rows.
    pub fn append(
        &self,
        modality: Modality,
        session_id: Option<&SessionId>,
        result: &AnalysisResult,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(result)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO results (modality, session_id, payload, arrived_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                modality.as_str(),
                session_id.map(|s| s.as_str().to_string()),
                payload,
                now,
            ],
        )?;
        conn.execute(
            "DELETE FROM results WHERE modality = ?1 AND id NOT IN (
                 SELECT id FROM results WHERE modality = ?1
                 ORDER BY id DESC LIMIT ?2
             )",
            rusqlite::params![modality.as_str(), RESULTS_PER_MODALITY as i64],
        )?;
        Ok(())
    }

    /// Rows currently held for a modality.
    pub fn count(&self, modality: Modality) -> Result<i64, CacheError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM results WHERE modality = ?1",
            [modality.as_str()],
            |row| row.get(0),
        )
        .map_err(CacheError::from)
    }
}

impl Clone for ResultCache {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}
