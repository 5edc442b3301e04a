//! QName Registry
//!
//! Maps textual [`QName`]s to dense numeric [`QNameId`]s persisted in the
//! `qnames` table. Ids are allocated lazily on first reference and are never
//! updated, reused or deleted.
//!
//! ## Lookup-or-allocate protocol
//!
//! ```text
//! id(name)
//!   ├─ cache hit ─────────────────────────────────────────────► id
//!   ├─ table.find(name) = Some(id) ──────────── cache ────────► id
//!   └─ lock allocation mutex
//!        ├─ table.find(name) = Some(id)  (double check) ──────► id
//!        ├─ m = table.max_id()
//!        └─ table.insert_if_absent(name, m + 1)
//!             ├─ applied ─────────────────────────────────────► m + 1
//!             └─ another writer won with id w ───────────────► w
//! ```
//!
//! Within one process the mutex and the double check make concurrent callers
//! for the same name agree on one id. Across processes the conditional insert
//! makes the first writer of a *name* win. Two processes registering two
//! *different* names at the same moment can still both read the same `max(id)`
//! and store the same numeric id; allocation is expected to run during
//! single-writer bootstrap.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, StorageError};
use crate::types::{QName, QNameId};

/// Persistent side of the registry: the `qnames` table of one keyspace.
#[async_trait]
pub trait QNameTable: Send + Sync {
    /// Id stored for `name`, if any.
    async fn find(&self, name: &str) -> Result<Option<i32>>;

    /// Largest id in the table, zero when empty.
    async fn max_id(&self) -> Result<i32>;

    /// Insert `name → id` unless `name` already exists.
    ///
    /// Returns `None` when the row was written, or the id that is already
    /// stored for `name`.
    async fn insert_if_absent(&self, name: &str, id: i32) -> Result<Option<i32>>;
}

/// Cached, allocation-safe front end over a [`QNameTable`].
pub struct QNameRegistry<T> {
    table: T,
    cache: RwLock<HashMap<QName, QNameId>>,
    alloc: Mutex<()>,
}

impl<T: QNameTable> QNameRegistry<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            cache: RwLock::new(HashMap::new()),
            alloc: Mutex::new(()),
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Id for `name`, allocating one on first reference.
    pub async fn id(&self, name: &QName) -> Result<QNameId> {
        if let Some(id) = self.cache.read().await.get(name) {
            return Ok(*id);
        }

        let text = name.to_string();
        if let Some(id) = self.table.find(&text).await? {
            return self.remember(name, id).await;
        }

        let _guard = self.alloc.lock().await;

        if let Some(id) = self.table.find(&text).await? {
            return self.remember(name, id).await;
        }

        let next = self
            .table
            .max_id()
            .await?
            .checked_add(1)
            .ok_or_else(|| StorageError::QNameIdsExhausted(text.clone()))?;
        if next > u16::MAX as i32 {
            return Err(StorageError::QNameIdsExhausted(text));
        }

        match self.table.insert_if_absent(&text, next).await? {
            None => {
                appstorage_observability::metrics::QNAME_ALLOCATIONS_TOTAL.inc();
                tracing::debug!(qname = %text, id = next, "Allocated QName id");
                self.remember(name, next).await
            }
            Some(existing) => {
                appstorage_observability::metrics::QNAME_ALLOCATION_CONFLICTS_TOTAL.inc();
                tracing::warn!(
                    qname = %text,
                    proposed = next,
                    existing,
                    "QName registered concurrently by another writer"
                );
                self.remember(name, existing).await
            }
        }
    }

    async fn remember(&self, name: &QName, id: i32) -> Result<QNameId> {
        let id = u16::try_from(id)
            .map(QNameId)
            .map_err(|_| StorageError::QNameIdsExhausted(name.to_string()))?;
        self.cache.write().await.insert(name.clone(), id);
        Ok(id)
    }
}

/// Process-local [`QNameTable`], used by the in-memory backend and in tests.
#[derive(Debug, Default)]
pub struct MemQNameTable {
    rows: std::sync::Mutex<HashMap<String, i32>>,
}

impl MemQNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, i32>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QNameTable for MemQNameTable {
    async fn find(&self, name: &str) -> Result<Option<i32>> {
        Ok(self.lock().get(name).copied())
    }

    async fn max_id(&self) -> Result<i32> {
        Ok(self.lock().values().copied().max().unwrap_or(0))
    }

    async fn insert_if_absent(&self, name: &str, id: i32) -> Result<Option<i32>> {
        let mut rows = self.lock();
        if let Some(existing) = rows.get(name) {
            return Ok(Some(*existing));
        }
        rows.insert(name.to_string(), id);
        Ok(None)
    }
}
