//! SQLite-backed preimage ledger.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::{Admission, LedgerError, LedgerRecord, LedgerResult, Preimage};
use crate::config::LedgerConfig;
use crate::observability::metrics;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS preimages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        preimage TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS preimages_preimage ON preimages (preimage);
";

struct LedgerInner {
    conn: Connection,
    /// Row count, kept in step with the table so inserts avoid COUNT(*).
    len: usize,
}

/// Capacity-bounded, insertion-ordered set of accepted preimages.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct PreimageLedger {
    inner: Arc<Mutex<LedgerInner>>,
    capacity: usize,
    max_preimage_bytes: usize,
}

impl PreimageLedger {
    /// Open (or create) the ledger stored at `path`.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> LedgerResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn, capacity)
    }

    /// A ledger that lives only as long as the process.
    pub fn in_memory(capacity: usize) -> LedgerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, capacity)
    }

    /// Open the ledger described by `config`.
    pub fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        let ledger = if config.path == ":memory:" {
            Self::in_memory(config.capacity)?
        } else {
            Self::open(&config.path, config.capacity)?
        };
        Ok(ledger.with_max_preimage_bytes(config.max_preimage_bytes))
    }

    fn from_connection(conn: Connection, capacity: usize) -> LedgerResult<Self> {
        conn.execute_batch(SCHEMA)?;
        let len: i64 = conn.query_row("SELECT COUNT(*) FROM preimages", [], |row| row.get(0))?;
        let len = len as usize;

        tracing::info!(records = len, capacity, "Preimage ledger opened");
        metrics::record_ledger_size(len);

        Ok(Self {
            inner: Arc::new(Mutex::new(LedgerInner { conn, len })),
            capacity,
            max_preimage_bytes: LedgerConfig::default().max_preimage_bytes,
        })
    }

    /// Override the longest accepted preimage.
    pub fn with_max_preimage_bytes(mut self, max_bytes: usize) -> Self {
        self.max_preimage_bytes = max_bytes;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_preimage_bytes(&self) -> usize {
        self.max_preimage_bytes
    }

    /// Record `preimage` unless it is already present.
    ///
    /// When the ledger is full the oldest records are evicted in the same
    /// transaction as the insert, so a failed submission leaves no trace.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidPreimage`] for empty or oversized values,
    /// [`LedgerError::AlreadyExists`] for duplicates, and a storage variant
    /// when SQLite fails.
    pub async fn submit(&self, preimage: &str) -> LedgerResult<Admission> {
        let preimage = Preimage::parse(preimage, self.max_preimage_bytes)?;
        let capacity = self.capacity;
        let result = self
            .with_inner(move |inner| insert(inner, &preimage, capacity))
            .await;

        match &result {
            Ok(admission) => {
                metrics::record_submission("accepted");
                if admission.evicted > 0 {
                    metrics::record_evictions(admission.evicted);
                }
            }
            Err(LedgerError::AlreadyExists) => metrics::record_submission("duplicate"),
            Err(LedgerError::InvalidPreimage(_)) => metrics::record_submission("invalid"),
            Err(_) => metrics::record_submission("storage_error"),
        }
        result
    }

    /// Whether `preimage` is currently retained.
    pub async fn contains(&self, preimage: &str) -> LedgerResult<bool> {
        let preimage = preimage.to_string();
        self.with_inner(move |inner| {
            let found = inner
                .conn
                .query_row(
                    "SELECT 1 FROM preimages WHERE preimage = ?1",
                    [&preimage],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    /// Number of retained preimages.
    pub async fn len(&self) -> LedgerResult<usize> {
        self.with_inner(|inner| Ok(inner.len)).await
    }

    pub async fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// All retained records, oldest first.
    pub async fn records(&self) -> LedgerResult<Vec<LedgerRecord>> {
        self.with_inner(|inner| {
            let mut stmt = inner
                .conn
                .prepare("SELECT id, preimage FROM preimages ORDER BY id ASC")?;
            let records = stmt
                .query_map([], |row| {
                    Ok(LedgerRecord {
                        sequence: row.get(0)?,
                        preimage: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_inner<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut LedgerInner) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.lock().map_err(|_| LedgerError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))?
    }
}

fn insert(inner: &mut LedgerInner, preimage: &Preimage, capacity: usize) -> LedgerResult<Admission> {
    let tx = inner
        .conn
        .transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing = tx
        .query_row(
            "SELECT id FROM preimages WHERE preimage = ?1",
            [preimage.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(LedgerError::AlreadyExists);
    }

    // Normally exactly one record; more only if the capacity was lowered
    // since the table was last written.
    let overflow = (inner.len + 1).saturating_sub(capacity);
    let evicted = if overflow > 0 {
        tx.execute(
            "DELETE FROM preimages WHERE id IN (
                SELECT id FROM preimages ORDER BY id ASC LIMIT ?1
            )",
            [overflow as i64],
        )?
    } else {
        0
    };

    tx.execute("INSERT INTO preimages (preimage) VALUES (?1)", [preimage.as_str()])
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => LedgerError::AlreadyExists,
            _ => LedgerError::Storage(e),
        })?;
    let sequence = tx.last_insert_rowid();
    tx.commit()?;

    inner.len = inner.len + 1 - evicted;
    metrics::record_ledger_size(inner.len);

    tracing::debug!(
        sequence,
        evicted,
        preimage_bytes = preimage.len(),
        records = inner.len,
        "Preimage admitted"
    );
    if evicted > 0 {
        tracing::info!(evicted, capacity, "Evicted oldest preimages");
    }

    Ok(Admission { sequence, evicted })
}
