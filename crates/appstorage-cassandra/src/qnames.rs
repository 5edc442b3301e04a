//! `qnames` table binding for the QName registry.
//!
//! Allocation writes use a lightweight transaction, so when two processes
//! register the same name the first committed row wins and the loser takes
//! the winner's id from the insert response. Every statement runs at
//! [`QNAME_CONSISTENCY`] whatever the data-plane setting.

use async_trait::async_trait;
use scylla::frame::response::result::CqlValue;
use scylla::prepared_statement::PreparedStatement;
use scylla::statement::{Consistency, SerialConsistency};
use scylla::Session;
use std::sync::Arc;

use appstorage_core::{QNameTable, Result, StorageError};

use crate::error::{query_error, row_error};
use crate::query;
use crate::storage::observe;

/// Consistency of every `qnames` statement, independent of
/// [`DataConsistency`](crate::DataConsistency). A stale `max(id)` would hand an
/// existing id to a new name.
pub const QNAME_CONSISTENCY: Consistency = Consistency::Quorum;

/// Paxos phase consistency of the conditional insert.
pub const QNAME_SERIAL_CONSISTENCY: SerialConsistency = SerialConsistency::Serial;

pub struct CassandraQNameTable {
    session: Arc<Session>,
    find: PreparedStatement,
    max_id: PreparedStatement,
    insert: PreparedStatement,
}

impl CassandraQNameTable {
    pub(crate) async fn prepare(session: Arc<Session>, keyspace: &str) -> Result<Self> {
        let find = prepare(&session, query::find_qname(keyspace)).await?;
        let max_id = prepare(&session, query::max_qname_id(keyspace)).await?;
        let mut insert = prepare(&session, query::insert_qname(keyspace)).await?;
        insert.set_serial_consistency(Some(QNAME_SERIAL_CONSISTENCY));

        Ok(Self {
            session,
            find,
            max_id,
            insert,
        })
    }
}

async fn prepare(session: &Session, cql: String) -> Result<PreparedStatement> {
    let mut prepared = session.prepare(cql).await.map_err(query_error)?;
    prepared.set_consistency(QNAME_CONSISTENCY);
    Ok(prepared)
}

/// Response of `insert ... if not exists`.
#[derive(Debug, PartialEq)]
enum InsertOutcome {
    Applied,
    /// Another writer registered the name first with this id.
    Existing(i32),
    /// Not applied, but the response carries no usable `id` column.
    ExistingUnread,
    Unexpected,
}

/// `columns` is the single response row; `id_column` the position of `id` in it.
fn insert_outcome(id_column: Option<usize>, columns: &[Option<CqlValue>]) -> InsertOutcome {
    match columns.first() {
        Some(Some(CqlValue::Boolean(true))) => InsertOutcome::Applied,
        Some(Some(CqlValue::Boolean(false))) => {
            match id_column.and_then(|i| columns.get(i)) {
                Some(Some(CqlValue::Int(id))) => InsertOutcome::Existing(*id),
                _ => InsertOutcome::ExistingUnread,
            }
        }
        _ => InsertOutcome::Unexpected,
    }
}

#[async_trait]
impl QNameTable for CassandraQNameTable {
    async fn find(&self, name: &str) -> Result<Option<i32>> {
        let result = observe("find_qname", self.session.execute(&self.find, (name,))).await?;
        let row = result
            .maybe_first_row_typed::<(i32,)>()
            .map_err(row_error)?;
        Ok(row.map(|(id,)| id))
    }

    async fn max_id(&self) -> Result<i32> {
        let result = observe("max_qname_id", self.session.execute(&self.max_id, ())).await?;
        let row = result
            .maybe_first_row_typed::<(Option<i32>,)>()
            .map_err(row_error)?;
        Ok(row.and_then(|(max,)| max).unwrap_or(0))
    }

    async fn insert_if_absent(&self, name: &str, id: i32) -> Result<Option<i32>> {
        let result = observe(
            "insert_qname",
            self.session.execute(&self.insert, (name, id)),
        )
        .await?;
        let id_column = result.col_specs.iter().position(|column| column.name == "id");
        let row = result.first_row().map_err(row_error)?;

        match insert_outcome(id_column, &row.columns) {
            InsertOutcome::Applied => Ok(None),
            InsertOutcome::Existing(existing) => Ok(Some(existing)),
            InsertOutcome::ExistingUnread => match self.find(name).await? {
                Some(existing) => Ok(Some(existing)),
                None => Err(StorageError::query(format!(
                    "QName {name} reported as existing but cannot be read back"
                ))),
            },
            InsertOutcome::Unexpected => Err(StorageError::query(format!(
                "Unexpected response to conditional insert of QName {name}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataConsistency;

    #[test]
    fn test_qname_statements_ignore_data_consistency() {
        assert_eq!(QNAME_CONSISTENCY, Consistency::Quorum);
        assert_eq!(QNAME_SERIAL_CONSISTENCY, SerialConsistency::Serial);
        assert_ne!(DataConsistency::Low.consistency(), QNAME_CONSISTENCY);
        assert_ne!(DataConsistency::High.consistency(), QNAME_CONSISTENCY);
    }

    #[test]
    fn test_applied_insert() {
        let columns = vec![Some(CqlValue::Boolean(true))];
        assert_eq!(insert_outcome(None, &columns), InsertOutcome::Applied);
    }

    #[test]
    fn test_lost_insert_reads_winner_from_response() {
        let columns = vec![
            Some(CqlValue::Boolean(false)),
            Some(CqlValue::Text("test.Winner".to_string())),
            Some(CqlValue::Int(17)),
        ];
        assert_eq!(insert_outcome(Some(2), &columns), InsertOutcome::Existing(17));
    }

    #[test]
    fn test_lost_insert_without_id_column() {
        let columns = vec![Some(CqlValue::Boolean(false))];
        assert_eq!(insert_outcome(None, &columns), InsertOutcome::ExistingUnread);
        assert_eq!(insert_outcome(Some(2), &columns), InsertOutcome::ExistingUnread);

        let columns = vec![Some(CqlValue::Boolean(false)), None, None];
        assert_eq!(insert_outcome(Some(2), &columns), InsertOutcome::ExistingUnread);
    }

    #[test]
    fn test_unexpected_insert_response() {
        assert_eq!(insert_outcome(None, &[]), InsertOutcome::Unexpected);
        let columns = vec![Some(CqlValue::Int(1))];
        assert_eq!(insert_outcome(None, &columns), InsertOutcome::Unexpected);
    }
}
