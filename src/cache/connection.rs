//! Lazily opened, process-wide connection to the cache database.
//!
//! The database has two partitions: `cache_entries` holds cached values and
//! `cache_metadata` holds one provenance record per entry. The schema version
//! lives in SQLite's `user_version` pragma. Opening is memoized in a
//! `tokio::sync::OnceCell`, so concurrent callers wait on the same attempt
//! and a failed attempt leaves the cell empty for the next caller to retry.
//! The blocking open parks its handle in a shared slot, so an open whose
//! caller gave up is picked up by the next caller instead of repeated.

// Author: kelexine (https://github.com/kelexine)

use crate::error::{CacheError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Value partition.
pub const VALUE_TABLE: &str = "cache_entries";

/// Metadata partition.
pub const METADATA_TABLE: &str = "cache_metadata";

/// Shared handle to the open database.
pub type Connection = Arc<Mutex<rusqlite::Connection>>;

pub struct ConnectionManager {
    db_path: PathBuf,
    busy_timeout: Duration,
    cell: OnceCell<Connection>,
    /// Handle produced by the blocking open, kept even if the awaiting caller timed out.
    opened: Arc<Mutex<Option<Connection>>>,
    open_attempts: Arc<AtomicUsize>,
}

impl ConnectionManager {
    pub fn new(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout,
            cell: OnceCell::new(),
            opened: Arc::new(Mutex::new(None)),
            open_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the shared connection, opening the database on first use.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::StoreUnavailable` if the database cannot be
    /// opened or initialized. The failure is not memoized.
    pub async fn connection(&self) -> Result<Connection> {
        self.cell.get_or_try_init(|| self.open()).await.cloned()
    }

    /// Number of underlying open attempts started so far.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.cell.initialized()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `op` against the shared connection on the blocking pool, within `limit`.
    ///
    /// The deadline is enforced where the connection lock is taken: once `op`
    /// starts it runs to completion and its result is reported, so an
    /// operation reported as `Timeout` never touched the database.
    pub(crate) async fn run<F, T>(&self, limit: Duration, op: F) -> Result<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Instant::now() + limit;
        let timed_out = move || CacheError::Timeout(limit.as_millis() as u64);

        let conn = tokio::time::timeout_at(deadline.into(), self.connection())
            .await
            .map_err(|_| timed_out())??;

        tokio::task::spawn_blocking(move || {
            let mut guard = conn.try_lock_until(deadline).ok_or_else(timed_out)?;
            op(&mut guard)
        })
        .await
        .map_err(|e| CacheError::Internal(format!("Cache task failed: {}", e)))?
    }

    async fn open(&self) -> Result<Connection> {
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;
        let slot = Arc::clone(&self.opened);
        let attempts = Arc::clone(&self.open_attempts);

        let opened = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let mut slot = slot.lock();
            if let Some(conn) = slot.as_ref() {
                return Ok(Arc::clone(conn));
            }

            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Opening cache database {} (attempt {})", path.display(), attempt);
            let conn = Arc::new(Mutex::new(open_store(&path, busy_timeout)?));
            *slot = Some(Arc::clone(&conn));
            Ok(conn)
        })
        .await
        .map_err(|e| CacheError::StoreUnavailable(format!("Open task failed: {}", e)))
        .and_then(|result| result);

        match opened {
            Ok(conn) => {
                info!("Cache database ready at {}", self.db_path.display());
                crate::metrics::record_store_open(true);
                Ok(conn)
            }
            Err(e) => {
                warn!("Cache database {} unavailable: {}", self.db_path.display(), e);
                crate::metrics::record_store_open(false);
                Err(e)
            }
        }
    }
}

fn open_store(path: &Path, busy_timeout: Duration) -> Result<rusqlite::Connection> {
    let unavailable = |what: &str, e: &dyn std::fmt::Display| {
        CacheError::StoreUnavailable(format!("{} {}: {}", what, path.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| unavailable("Failed to create directory for", &e))?;
    }

    let mut conn =
        rusqlite::Connection::open(path).map_err(|e| unavailable("Failed to open", &e))?;

    conn.busy_timeout(busy_timeout)
        .map_err(|e| unavailable("Failed to configure", &e))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
        .map_err(|e| unavailable("Failed to set pragmas on", &e))?;

    init_schema(&mut conn).map_err(|e| match e {
        CacheError::StoreUnavailable(_) => e,
        other => unavailable("Failed to initialize schema of", &other),
    })?;

    Ok(conn)
}

/// Creates any missing partition and records the schema version.
///
/// Existing partitions and their rows are left untouched. A database written
/// by a newer schema is refused rather than downgraded.
pub(crate) fn init_schema(conn: &mut rusqlite::Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(CacheError::StoreUnavailable(format!(
            "Database schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {VALUE_TABLE} (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (
            key TEXT PRIMARY KEY,
            original_key TEXT NOT NULL,
            url TEXT,
            timestamp INTEGER NOT NULL
        );
        "#
    ))?;

    if version < SCHEMA_VERSION {
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!("Upgraded cache schema from version {} to {}", version, SCHEMA_VERSION);
    }
    tx.commit()?;

    Ok(())
}
