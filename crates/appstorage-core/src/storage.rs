//! Application storage contract.
//!
//! [`AppStorage`] is the operation surface a host application sees for one
//! tenant: records, the two event logs, and view entries. Backends implement
//! the point operations plus two scan primitives ([`AppStorage::read_log_part`]
//! and [`AppStorage::scan_view`]); range planning, clustering-prefix
//! translation and cancellation handling live here so every backend behaves
//! the same.
//!
//! ## Reading a log
//!
//! ```text
//! read_plog(offset, count)
//!   └─ LogRangePlan ── part 0 ─► read_log_part ─► rows ─► cb(offset, event)
//!                   ├─ part 1 ─► read_log_part ─► rows ─► cb(...)
//!                   └─ part k ─► read_log_part ─► 0 rows ─► stop
//! ```
//!
//! ## Cancellation
//!
//! Reads take a [`CancellationToken`]. It is observed between rows (and while
//! waiting for the next page). A cancelled read returns `Ok(())`: "read up to N
//! events, then stop" is a normal way for hosts to consume a log.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::offset::uncrack;
use crate::plan::{LogPart, LogRangePlan};
use crate::range::ClusteringRange;
use crate::types::{
    AppName, LogId, Offset, PartitionId, QName, QNameId, ReadCount, RecordId, WsId,
};

/// Receives log events in ascending offset order. Returning an error aborts
/// the read and the error is returned to the caller unchanged.
pub type LogReaderCallback<'a> = dyn FnMut(Offset, Vec<u8>) -> Result<()> + Send + 'a;

/// Receives `(clustering columns, value)` pairs in clustering order.
pub type ViewReaderCallback<'a> = dyn FnMut(Vec<u8>, Vec<u8>) -> Result<()> + Send + 'a;

/// Result of scanning one log partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOutcome {
    /// The partition delivered this many events. Zero means end of log.
    Rows(u64),
    /// The cancellation token fired during the scan.
    Cancelled,
}

/// Storage for one application (tenant).
///
/// All implementations must be `Send + Sync` and safe to share across tasks
/// via `Arc<dyn AppStorage>`. No ordering is guaranteed between concurrent
/// appends to the same log; hosts serialize them.
#[async_trait]
pub trait AppStorage: Send + Sync {
    // ============================================================
    // RECORDS
    // ============================================================

    /// Read the record `(ws, id)` into `data`.
    ///
    /// `data` is cleared first. Returns `Ok(false)` when no such record exists.
    async fn get_record(&self, ws: WsId, id: RecordId, data: &mut Vec<u8>) -> Result<bool>;

    /// Create or overwrite the record `(ws, id)`.
    async fn put_record(&self, ws: WsId, id: RecordId, data: &[u8]) -> Result<()>;

    // ============================================================
    // EVENT LOGS
    // ============================================================

    /// Store `event` at `offset` of PLog `partition`.
    async fn put_plog_event(
        &self,
        partition: PartitionId,
        offset: Offset,
        event: &[u8],
    ) -> Result<()>;

    /// Store `event` at `offset` of the workspace log of `ws`.
    async fn put_wlog_event(&self, ws: WsId, offset: Offset, event: &[u8]) -> Result<()>;

    /// Deliver the events of one storage partition of `log`, restricted to the
    /// clustering window of `part`, in ascending order.
    ///
    /// Backend primitive behind [`read_plog`](Self::read_plog) and
    /// [`read_wlog`](Self::read_wlog).
    async fn read_log_part(
        &self,
        cancel: &CancellationToken,
        log: LogId,
        part: LogPart,
        cb: &mut LogReaderCallback<'_>,
    ) -> Result<PartOutcome>;

    /// Read up to `count` events of PLog `partition`, starting at `offset`.
    async fn read_plog(
        &self,
        cancel: &CancellationToken,
        partition: PartitionId,
        offset: Offset,
        count: ReadCount,
        cb: &mut LogReaderCallback<'_>,
    ) -> Result<()> {
        read_log(self, cancel, LogId::PLog(partition), offset, count, cb).await
    }

    /// Read up to `count` events of the workspace log of `ws`, starting at
    /// `offset`.
    async fn read_wlog(
        &self,
        cancel: &CancellationToken,
        ws: WsId,
        offset: Offset,
        count: ReadCount,
        cb: &mut LogReaderCallback<'_>,
    ) -> Result<()> {
        read_log(self, cancel, LogId::WLog(ws), offset, count, cb).await
    }

    // ============================================================
    // VIEWS
    // ============================================================

    /// Create or overwrite a view entry. `None` clustering columns are stored
    /// as the empty byte string.
    async fn put_view_record(
        &self,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        c_cols: Option<&[u8]>,
        value: &[u8],
    ) -> Result<()>;

    /// Read a view entry into `data` (cleared first). `Ok(false)` when absent.
    async fn get_view_record(
        &self,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        c_cols: Option<&[u8]>,
        data: &mut Vec<u8>,
    ) -> Result<bool>;

    /// Deliver the entries of one view partition that fall inside `range`.
    ///
    /// Backend primitive behind [`read_view`](Self::read_view) and
    /// [`read_view_range`](Self::read_view_range).
    async fn scan_view(
        &self,
        cancel: &CancellationToken,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        range: &ClusteringRange,
        cb: &mut ViewReaderCallback<'_>,
    ) -> Result<()>;

    /// Read every entry whose clustering columns start with `partial_c_cols`.
    /// An empty prefix reads the whole partition.
    async fn read_view(
        &self,
        cancel: &CancellationToken,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        partial_c_cols: &[u8],
        cb: &mut ViewReaderCallback<'_>,
    ) -> Result<()> {
        let range = ClusteringRange::prefix(partial_c_cols);
        self.scan_view(cancel, view, ws, p_key, &range, cb).await
    }

    /// Read entries with `start <= c_cols < finish`; an empty bound is open.
    /// A range with `start >= finish` yields nothing and sends no query.
    async fn read_view_range(
        &self,
        cancel: &CancellationToken,
        view: &QName,
        ws: WsId,
        p_key: &[u8],
        start: &[u8],
        finish: &[u8],
        cb: &mut ViewReaderCallback<'_>,
    ) -> Result<()> {
        let range = ClusteringRange::between(start, finish);
        if range == ClusteringRange::Nothing {
            return Ok(());
        }
        self.scan_view(cancel, view, ws, p_key, &range, cb).await
    }

    // ============================================================
    // QNAMES
    // ============================================================

    /// Dense id of `name`, allocated on first reference.
    async fn get_qname_id(&self, name: &QName) -> Result<QNameId>;
}

/// Hands out the storage of each configured application.
pub trait AppStorageProvider: Send + Sync {
    /// Storage for `app`, or [`StorageError::AppNotFound`](crate::StorageError::AppNotFound).
    fn app_storage(&self, app: &AppName) -> Result<Arc<dyn AppStorage>>;
}

/// Drive a [`LogRangePlan`] over `storage`, one partition at a time.
pub async fn read_log<S>(
    storage: &S,
    cancel: &CancellationToken,
    log: LogId,
    offset: Offset,
    count: ReadCount,
    cb: &mut LogReaderCallback<'_>,
) -> Result<()>
where
    S: AppStorage + ?Sized,
{
    for part in LogRangePlan::new(offset, count) {
        appstorage_observability::metrics::LOG_PARTS_READ_TOTAL
            .with_label_values(&[log.kind()])
            .inc();

        match storage.read_log_part(cancel, log, part, cb).await? {
            PartOutcome::Rows(0) => break,
            PartOutcome::Rows(n) => {
                appstorage_observability::metrics::LOG_EVENTS_READ_TOTAL
                    .with_label_values(&[log.kind()])
                    .inc_by(n);
            }
            PartOutcome::Cancelled => {
                tracing::debug!(log = log.kind(), part = part.part, "Log read cancelled");
                break;
            }
        }
    }
    Ok(())
}

/// Feed `(offset_low, event)` rows of partition `part` to `cb`.
pub async fn pump_log_rows<S>(
    rows: S,
    part: i64,
    cancel: &CancellationToken,
    cb: &mut LogReaderCallback<'_>,
) -> Result<PartOutcome>
where
    S: Stream<Item = Result<(i16, Vec<u8>)>>,
{
    let mut rows = std::pin::pin!(rows);
    let mut read = 0u64;
    loop {
        let row = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PartOutcome::Cancelled),
            row = rows.next() => row,
        };
        let Some(row) = row else {
            return Ok(PartOutcome::Rows(read));
        };
        let (clust, event) = row?;
        cb(Offset(uncrack(part, clust)), event)?;
        read += 1;
    }
}

/// Feed `(c_col, value)` rows to `cb`. Cancellation ends the scan with success.
pub async fn pump_view_rows<S>(
    rows: S,
    cancel: &CancellationToken,
    cb: &mut ViewReaderCallback<'_>,
) -> Result<()>
where
    S: Stream<Item = Result<(Vec<u8>, Vec<u8>)>>,
{
    let mut rows = std::pin::pin!(rows);
    loop {
        let row = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            row = rows.next() => row,
        };
        let Some(row) = row else {
            return Ok(());
        };
        let (c_col, value) = row?;
        cb(c_col, value)?;
    }
}
