//! Cassandra / Scylla Application Storage
//!
//! [`CassandraAppStorage`] binds the storage contract to one keyspace through
//! a shared driver session. All statements are prepared once, right after the
//! schema is in place, and every data-plane statement carries the configured
//! [`DataConsistency`](crate::config::DataConsistency).
//!
//! ## Statement selection
//!
//! Log part scans and view scans have four shapes each, depending on which
//! bounds the sub-query needs:
//!
//! ```text
//!                 upper bound
//!                 no          yes
//! lower   no     [open]      [upper]
//! bound   yes    [lower]     [both]
//! ```
//!
//! Partitions are addressed by their natural key only, so a part that covers
//! the whole 0..4095 window is a plain single-partition select.
//!
//! ## Column widths
//!
//! Unsigned identifiers are stored with their bit pattern preserved:
//! `WsId` as `bigint`, `PartitionId` and `QNameId` as `smallint`.

use async_trait::async_trait;
use futures::TryStreamExt;
use scylla::frame::response::result::CqlValue;
use scylla::prepared_statement::PreparedStatement;
use scylla::statement::Consistency;
use scylla::transport::errors::QueryError;
use scylla::Session;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use appstorage_core::range::normalize;
use appstorage_core::storage::{pump_log_rows, pump_view_rows};
use appstorage_core::{
    crack, AppName, AppStorage, ClusteringRange, LogId, LogPart, LogReaderCallback, Offset,
    PartOutcome, PartitionId, QName, QNameId, QNameRegistry, RecordId, Result, ViewReaderCallback,
    WsId,
};
use appstorage_observability::metrics::{
    SESSIONS_OPEN, STORAGE_QUERIES_TOTAL, STORAGE_QUERY_ERRORS_TOTAL, STORAGE_QUERY_LATENCY,
};

use crate::error::{next_row_error, query_error, row_error};
use crate::qnames::CassandraQNameTable;
use crate::query;

/// Count, time and classify one driver call.
pub(crate) async fn observe<T, F>(operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, QueryError>>,
{
    STORAGE_QUERIES_TOTAL.with_label_values(&[operation]).inc();
    let _timer = STORAGE_QUERY_LATENCY
        .with_label_values(&[operation])
        .start_timer();

    fut.await.map_err(|e| {
        STORAGE_QUERY_ERRORS_TOTAL
            .with_label_values(&[operation])
            .inc();
        debug!(operation, error = %e, "Query failed");
        query_error(e)
    })
}

/// The four bound variants of a range statement.
struct Bounded {
    open: PreparedStatement,
    lower: PreparedStatement,
    upper: PreparedStatement,
    both: PreparedStatement,
}

impl Bounded {
    async fn prepare(
        session: &Session,
        consistency: Consistency,
        cql: impl Fn(bool, bool) -> String,
    ) -> Result<Self> {
        Ok(Self {
            open: prepare(session, consistency, cql(false, false)).await?,
            lower: prepare(session, consistency, cql(true, false)).await?,
            upper: prepare(session, consistency, cql(false, true)).await?,
            both: prepare(session, consistency, cql(true, true)).await?,
        })
    }

    fn pick(&self, lower: bool, upper: bool) -> &PreparedStatement {
        match (lower, upper) {
            (false, false) => &self.open,
            (true, false) => &self.lower,
            (false, true) => &self.upper,
            (true, true) => &self.both,
        }
    }
}

async fn prepare(
    session: &Session,
    consistency: Consistency,
    cql: String,
) -> Result<PreparedStatement> {
    let mut prepared = session.prepare(cql).await.map_err(query_error)?;
    prepared.set_consistency(consistency);
    Ok(prepared)
}

struct Statements {
    get_record: PreparedStatement,
    put_record: PreparedStatement,
    put_plog: PreparedStatement,
    put_wlog: PreparedStatement,
    read_plog: Bounded,
    read_wlog: Bounded,
    put_view: PreparedStatement,
    get_view: PreparedStatement,
    scan_view: Bounded,
}

impl Statements {
    async fn prepare(session: &Session, keyspace: &str, consistency: Consistency) -> Result<Self> {
        let plog = LogId::PLog(PartitionId(0));
        let wlog = LogId::WLog(WsId(0));

        Ok(Self {
            get_record: prepare(session, consistency, query::get_record(keyspace)).await?,
            put_record: prepare(session, consistency, query::put_record(keyspace)).await?,
            put_plog: prepare(session, consistency, query::put_log_event(keyspace, &plog)).await?,
            put_wlog: prepare(session, consistency, query::put_log_event(keyspace, &wlog)).await?,
            read_plog: Bounded::prepare(session, consistency, |lower, upper| {
                query::read_log_part(keyspace, &plog, lower, upper)
            })
            .await?,
            read_wlog: Bounded::prepare(session, consistency, |lower, upper| {
                query::read_log_part(keyspace, &wlog, lower, upper)
            })
            .await?,
            put_view: prepare(session, consistency, query::put_view_record(keyspace)).await?,
            get_view: prepare(session, consistency, query::get_view_record(keyspace)).await?,
            scan_view: Bounded::prepare(session, consistency, |start, finish| {
                query::scan_view(keyspace, start, finish)
            })
            .await?,
        })
    }
}

/// Bind value of a log's partition-key column.
fn log_partition_value(log: LogId) -> CqlValue {
    match log {
        LogId::PLog(PartitionId(p)) => CqlValue::SmallInt(p as i16),
        LogId::WLog(WsId(ws)) => CqlValue::BigInt(ws as i64),
    }
}

/// Storage of one application, backed by one keyspace.
pub struct CassandraAppStorage {
    app: AppName,
    keyspace: String,
    session: Arc<Session>,
    statements: Statements,
    qnames: QNameRegistry<CassandraQNameTable>,
}

impl CassandraAppStorage {
    /// Prepare every statement against an existing schema.
    pub(crate) async fn prepare(
        app: AppName,
        keyspace: String,
        session: Arc<Session>,
        consistency: Consistency,
    ) -> Result<Self> {
        let statements = Statements::prepare(&session, &keyspace, consistency).await?;
        let table = CassandraQNameTable::prepare(Arc::clone(&session), &keyspace).await?;

        SESSIONS_OPEN.inc();
        Ok(Self {
            app,
            keyspace,
            session,
            statements,
            qnames: QNameRegistry::new(table),
        })
    }

    pub fn app(&self) -> &AppName {
        &self.app
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    async fn put_log_event(
        &self,
        statement: &PreparedStatement,
        log: LogId,
        offset: Offset,
        event: &[u8],
    ) -> Result<()> {
        let (hi, lo) = crack(offset.0);
        observe(
            "put_log_event",
            self.session
                .execute(statement, (log_partition_value(log), hi, lo, event)),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CassandraAppStorage {
    fn drop(&mut self) {
        SESSIONS_OPEN.dec();
        debug!(app = %self.app, keyspace = %self.keyspace, "Storage released");
    }
}

#[async_trait]
impl AppStorage for CassandraAppStorage {
    async fn get_record(&self, ws: WsId, id: RecordId, data: &mut Vec<u8>) -> Result<bool> {
        data.clear();
        let (hi, lo) = crack(id.0);
        let result = observe(
            "get_record",
            self.session
                .execute(&self.statements.get_record, (ws.0 as i64, hi, lo)),
        )
        .await?;

        match result
            .maybe_first_row_typed::<(Vec<u8>,)>()
            .map_err(row_error)?
        {
            Some((stored,)) => {
                *data = stored;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_record(&self, ws: WsId, id: RecordId, data: &[u8]) -> Result<()> {
        let (hi, lo) = crack(id.0);
        observe(
            "put_record",
            self.session
                .execute(&self.statements.put_record, (ws.0 as i64, hi, lo, data)),
        )
        .await?;
        Ok(())
    }

    async fn put_plog_event(
        &self,
        partition: PartitionId,
        offset: Offset,
        event: &[u8],
    ) -> Result<()> {
        self.put_log_event(&self.statements.put_plog, LogId::PLog(partition), offset, event)
            .await
    }

    async fn put_wlog_event(&self, ws: WsId, offset: Offset, event: &[u8]) -> Result<()> {
        self.put_log_event(&self.statements.put_wlog, LogId::WLog(ws), offset, event)
            .await
    }

    async fn read_log_part(
        &self,
        cancel: &CancellationToken,
        log: LogId,
        part: LogPart,
        cb: &mut LogReaderCallback<'_>,
    ) -> Result<PartOutcome> {
        let lower = part.has_lower_bound();
        let upper = part.has_upper_bound();
        let statement = match log {
            LogId::PLog(_) => self.statements.read_plog.pick(lower, upper),
            LogId::WLog(_) => self.statements.read_wlog.pick(lower, upper),
        };

        let mut values = vec![log_partition_value(log), CqlValue::BigInt(part.part)];
        if lower {
            values.push(CqlValue::SmallInt(part.clust_from));
        }
        if upper {
            values.push(CqlValue::SmallInt(part.clust_to));
        }

        let rows = observe(
            "read_log_part",
            self.session.execute_iter(statement.clone(), values),
        )
        .await?
        .into_typed::<(i16, Vec<u8>)>()
        .map_err(next_row_error);

        pump_log_rows(rows, part.part, cancel, cb).await
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
        observe(
            "put_view_record",
            self.session.execute(
                &self.statements.put_view,
                (ws.0 as i64, qid.as_smallint(), p_key, normalize(c_cols), value),
            ),
        )
        .await?;
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
        data.clear();
        let qid = self.qnames.id(view).await?;
        let result = observe(
            "get_view_record",
            self.session.execute(
                &self.statements.get_view,
                (ws.0 as i64, qid.as_smallint(), p_key, normalize(c_cols)),
            ),
        )
        .await?;

        match result
            .maybe_first_row_typed::<(Vec<u8>,)>()
            .map_err(row_error)?
        {
            Some((stored,)) => {
                *data = stored;
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
        if *range == ClusteringRange::Nothing {
            return Ok(());
        }

        let qid = self.qnames.id(view).await?;
        let mut values = vec![
            CqlValue::BigInt(ws.0 as i64),
            CqlValue::SmallInt(qid.as_smallint()),
            CqlValue::Blob(p_key.to_vec()),
        ];
        if let Some(start) = range.start() {
            values.push(CqlValue::Blob(start.to_vec()));
        }
        if let Some(finish) = range.finish() {
            values.push(CqlValue::Blob(finish.to_vec()));
        }
        let statement = self
            .statements
            .scan_view
            .pick(range.start().is_some(), range.finish().is_some());

        let rows = observe(
            "scan_view",
            self.session.execute_iter(statement.clone(), values),
        )
        .await?
        .into_typed::<(Vec<u8>, Vec<u8>)>()
        .map_err(next_row_error);

        pump_view_rows(rows, cancel, cb).await
    }

    async fn get_qname_id(&self, name: &QName) -> Result<QNameId> {
        self.qnames.id(name).await
    }
}
