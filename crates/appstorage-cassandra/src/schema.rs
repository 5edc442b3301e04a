//! Keyspace Schema
//!
//! One keyspace per application holds five fixed tables:
//!
//! ```text
//! records       ((wsid, id_hi), id_low)                 data
//! plog          ((partition_id, offset_hi), offset_low) event
//! wlog          ((wsid, offset_hi), offset_low)         event
//! view_records  ((wsid, qname, p_key), c_col)           value
//! qnames        (name)                                  id
//! ```
//!
//! Every statement is `if not exists`, so creating the schema against an
//! existing keyspace changes nothing. Tables are never altered or dropped.

use scylla::Session;
use tracing::info;

use appstorage_core::{Result, StorageError};

use crate::config::AppParams;
use crate::error::query_error;
use crate::retry::{retry, RetryPolicy};

/// A table of the application keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    /// Column list and primary key.
    pub definition: &'static str,
}

pub const TABLES: [TableDef; 5] = [
    TableDef {
        name: "records",
        definition: "(wsid bigint, id_hi bigint, id_low smallint, data blob, \
                     primary key ((wsid, id_hi), id_low))",
    },
    TableDef {
        name: "plog",
        definition: "(partition_id smallint, offset_hi bigint, offset_low smallint, event blob, \
                     primary key ((partition_id, offset_hi), offset_low))",
    },
    TableDef {
        name: "wlog",
        definition: "(wsid bigint, offset_hi bigint, offset_low smallint, event blob, \
                     primary key ((wsid, offset_hi), offset_low))",
    },
    TableDef {
        name: "view_records",
        definition: "(wsid bigint, qname smallint, p_key blob, c_col blob, value blob, \
                     primary key ((wsid, qname, p_key), c_col))",
    },
    TableDef {
        name: "qnames",
        definition: "(name text, id int, primary key (name))",
    },
];

pub fn create_keyspace(app: &AppParams) -> String {
    format!(
        "create keyspace if not exists {} with replication = {}",
        app.keyspace,
        app.replication_map()
    )
}

pub fn create_table(keyspace: &str, table: &TableDef) -> String {
    format!(
        "create table if not exists {keyspace}.{} {}",
        table.name, table.definition
    )
}

async fn execute_ddl(session: &Session, cql: &str) -> Result<()> {
    session.query(cql, ()).await.map_err(query_error)?;
    session
        .await_schema_agreement()
        .await
        .map_err(query_error)?;
    Ok(())
}

/// Create the keyspace of `app` and its tables, retrying each statement.
///
/// A statement that still fails after the last attempt aborts setup with a
/// [`StorageError::Setup`] naming the keyspace or table.
pub async fn create_schema(session: &Session, app: &AppParams, policy: &RetryPolicy) -> Result<()> {
    let keyspace = &app.keyspace;

    let target = format!("keyspace {keyspace}");
    let cql = create_keyspace(app);
    retry(policy, &target, || execute_ddl(session, &cql))
        .await
        .map_err(|e| StorageError::setup(target.clone(), e))?;

    for table in &TABLES {
        let target = format!("table {keyspace}.{}", table.name);
        let cql = create_table(keyspace, table);
        retry(policy, &target, || execute_ddl(session, &cql))
            .await
            .map_err(|e| StorageError::setup(target.clone(), e))?;
    }

    info!(keyspace = %keyspace, replication = %app.replication_map(), "Schema ready");
    Ok(())
}
