//! In-Memory Storage
//!
//! Process-local [`AppStorage`] implementation. It mirrors the persisted layout
//! (logs keyed by `(log, offset)`, views by `(ws, qname id, p_key)` then
//! `c_col`), runs the same QName registry protocol, and goes through the same
//! row pumps as the cluster backend, so it is a faithful stand-in for hosts'
//! unit tests.
//!
//! ## Usage
//!
//! ```ignore
//! use appstorage_core::{AppName, AppStorageProvider, MemStorageProvider};
//!
//! let provider = MemStorageProvider::new([AppName::from("app1")]);
//! let storage = provider.app_storage(&AppName::from("app1"))?;
//! storage.put_record(WsId(1), RecordId(42), b"data").await?;
//! ```

use async_trait::async_trait;
use futures::stream;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StorageError};
use crate::offset::crack;
use crate::plan::LogPart;
use crate::range::{normalize, ClusteringRange};
use crate::registry::{MemQNameTable, QNameRegistry};
use crate::storage::{
    pump_log_rows, pump_view_rows, AppStorage, AppStorageProvider, LogReaderCallback,
    PartOutcome, ViewReaderCallback,
};
use crate::types::{AppName, LogId, Offset, PartitionId, QName, QNameId, RecordId, WsId};

type ViewPartition = (WsId, QNameId, Vec<u8>);

#[derive(Debug, Default)]
struct MemState {
    records: HashMap<(WsId, RecordId), Vec<u8>>,
    logs: BTreeMap<(LogKey, u64), Vec<u8>>,
    views: HashMap<ViewPartition, BTreeMap<Vec<u8>, Vec<u8>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LogKey {
    PLog(u16),
    WLog(u64),
}

impl From<LogId> for LogKey {
    fn from(log: LogId) -> Self {
        match log {
            LogId::PLog(PartitionId(p)) => LogKey::PLog(p),
            LogId::WLog(WsId(ws)) => LogKey::WLog(ws),
        }
    }
}

/// Storage for one application, held entirely in memory.
pub struct MemAppStorage {
    state: RwLock<MemState>,
    qnames: QNameRegistry<MemQNameTable>,
}

impl Default for MemAppStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemAppStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState::default()),
            qnames: QNameRegistry::new(MemQNameTable::new()),
        }
    }

    /// Number of names registered in this storage's QName table.
    pub fn qname_count(&self) -> usize {
        self.qnames.table().len()
    }

    async fn put_log_event(&self, log: LogId, offset: Offset, event: &[u8]) -> Result<()> {
        self.state
            .write()
            .await
            .logs
            .insert((log.into(), offset.0), event.to_vec());
        Ok(())
    }
}

#[async_trait]
impl AppStorage for MemAppStorage {
    async fn get_record(&self, ws: WsId, id: RecordId, data: &mut Vec<u8>) -> Result<bool> {
        data.clear();
        match self.state.read().await.records.get(&(ws, id)) {
            Some(stored) => {
                data.extend_from_slice(stored);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_record(&self, ws: WsId, id: RecordId, data: &[u8]) -> Result<()> {
        self.state
            .write()
            .await
            .records
            .insert((ws, id), data.to_vec());
        Ok(())
    }

    async fn put_plog_event(
        &self,
        partition: PartitionId,
        offset: Offset,
        event: &[u8],
    ) -> Result<()> {
        self.put_log_event(LogId::PLog(partition), offset, event)
            .await
    }

    async fn put_wlog_event(&self, ws: WsId, offset: Offset, event: &[u8]) -> Result<()> {
        self.put_log_event(LogId::WLog(ws), offset, event).await
    }

    async fn read_log_part(
        &self,
        cancel: &CancellationToken,
        log: LogId,
        part: LogPart,
        cb: &mut LogReaderCallback<'_>,
    ) -> Result<PartOutcome> {
        let key = LogKey::from(log);
        let rows: Vec<Result<(i16, Vec<u8>)>> = {
            let state = self.state.read().await;
            state
                .logs
                .range((key, part.first_offset().0)..=(key, part.last_offset().0))
                .map(|((_, offset), event)| Ok((crack(*offset).1, event.clone())))
                .collect()
        };

        pump_log_rows(stream::iter(rows), part.part, cancel, cb).await
    }

    async fn put_view_record(
        &self,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        c_cols: Option<&[u8]>,
        value: &[u8],
    ) -> Result<()> {
        let qid = self.qnames.id(view).await?;
        self.state
            .write()
            .await
            .views
            .entry((ws, qid, p_key.to_vec()))
            .or_default()
            .insert(normalize(c_cols).to_vec(), value.to_vec());
        Ok(())
    }

    async fn get_view_record(
        &self,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        c_cols: Option<&[u8]>,
        data: &mut Vec<u8>,
    ) -> Result<bool> {
        let qid = self.qnames.id(view).await?;
        data.clear();
        let state = self.state.read().await;
        let found = state
            .views
            .get(&(ws, qid, p_key.to_vec()))
            .and_then(|partition| partition.get(normalize(c_cols)));
        match found {
            Some(value) => {
                data.extend_from_slice(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scan_view(
        &self,
        cancel: &CancellationToken,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        range: &ClusteringRange,
        cb: &mut ViewReaderCallback<'_>,
    ) -> Result<()> {
        let qid = self.qnames.id(view).await?;
        let rows: Vec<Result<(Vec<u8>, Vec<u8>)>> = {
            let state = self.state.read().await;
            match state.views.get(&(ws, qid, p_key.to_vec())) {
                Some(partition) => partition
                    .iter()
                    .filter(|(c_col, _)| range.contains(c_col))
                    .map(|(c_col, value)| Ok((c_col.clone(), value.clone())))
                    .collect(),
                None => Vec::new(),
            }
        };

        pump_view_rows(stream::iter(rows), cancel, cb).await
    }

    async fn get_qname_id(&self, name: &QName) -> Result<QNameId> {
        self.qnames.id(name).await
    }
}

/// [`AppStorageProvider`] over [`MemAppStorage`]s.
#[derive(Default)]
pub struct MemStorageProvider {
    cache: HashMap<AppName, Arc<MemAppStorage>>,
}

impl MemStorageProvider {
    pub fn new(apps: impl IntoIterator<Item = AppName>) -> Self {
        Self {
            cache: apps
                .into_iter()
                .map(|app| (app, Arc::new(MemAppStorage::new())))
                .collect(),
        }
    }
}

impl AppStorageProvider for MemStorageProvider {
    fn app_storage(&self, app: &AppName) -> Result<Arc<dyn AppStorage>> {
        self.cache
            .get(app)
            .map(|storage| Arc::clone(storage) as Arc<dyn AppStorage>)
            .ok_or_else(|| StorageError::AppNotFound(app.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadCount;

    #[tokio::test]
    async fn test_technology_compatibility_kit() {
        let storage = MemAppStorage::new();
        crate::tck::run(&storage).await.unwrap();
    }

    #[tokio::test]
    async fn test_tck_is_repeatable_on_same_storage() {
        let storage = MemAppStorage::new();
        crate::tck::run(&storage).await.unwrap();
        crate::tck::run(&storage).await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_app_not_found() {
        let provider = MemStorageProvider::new([AppName::from("app1")]);

        assert!(provider.app_storage(&AppName::from("app1")).is_ok());
        let err = provider.app_storage(&AppName::from("testApp")).err().unwrap();
        assert!(matches!(err, StorageError::AppNotFound(ref name) if name == "testApp"));
    }

    #[tokio::test]
    async fn test_provider_hands_out_same_storage() {
        let provider = MemStorageProvider::new([AppName::from("app1")]);
        let app = AppName::from("app1");

        provider
            .app_storage(&app)
            .unwrap()
            .put_record(WsId(1), RecordId(1), b"shared")
            .await
            .unwrap();

        let mut data = Vec::new();
        let found = provider
            .app_storage(&app)
            .unwrap()
            .get_record(WsId(1), RecordId(1), &mut data)
            .await
            .unwrap();
        assert!(found);
        assert_eq!(data, b"shared");
    }

    #[tokio::test]
    async fn test_logs_are_isolated() {
        let storage = MemAppStorage::new();
        let cancel = CancellationToken::new();
        storage
            .put_plog_event(PartitionId(1), Offset(0), b"plog")
            .await
            .unwrap();
        storage
            .put_wlog_event(WsId(1), Offset(0), b"wlog")
            .await
            .unwrap();

        let mut events = Vec::new();
        storage
            .read_plog(&cancel, PartitionId(1), Offset(0), ReadCount::ToTheEnd, &mut |_, e| {
                events.push(e);
                Ok(())
            })
            .await
            .unwrap();
        storage
            .read_plog(&cancel, PartitionId(2), Offset(0), ReadCount::ToTheEnd, &mut |_, e| {
                events.push(e);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(events, vec![b"plog".to_vec()]);
    }

    #[tokio::test]
    async fn test_views_allocate_qnames() {
        let storage = MemAppStorage::new();
        storage
            .put_view_record(&QName::new("bo", "A"), WsId(1), b"p", None, b"v")
            .await
            .unwrap();
        storage
            .put_view_record(&QName::new("bo", "B"), WsId(1), b"p", None, b"v")
            .await
            .unwrap();
        assert_eq!(storage.qname_count(), 2);
    }
}
