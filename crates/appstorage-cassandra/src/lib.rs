//! Cassandra / Scylla Application Storage
//!
//! Cluster-backed implementation of the `appstorage-core` contract. Each
//! application gets its own keyspace, its own driver session and a
//! [`CassandraAppStorage`] handle dispensed by [`CassandraStorageProvider`].
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │ CassandraStorageProvider  │  app name → storage, built once at startup
//! └────────────┬──────────────┘
//!              │ Arc<dyn AppStorage>
//!              ▼
//! ┌───────────────────────────┐     ┌────────────────────────┐
//! │   CassandraAppStorage     │ ──► │ QNameRegistry          │
//! │   prepared statements     │     │  └─ CassandraQNameTable│
//! └────────────┬──────────────┘     └────────────────────────┘
//!              │ CQL (scylla driver, paged)
//!              ▼
//!      ┌──────────────┐
//!      │   Cluster    │  <keyspace>.{records, plog, wlog, view_records, qnames}
//!      └──────────────┘
//! ```
//!
//! ## Consistency
//!
//! Data-plane statements run at `QUORUM` unless
//! [`ClusterParams::consistency`](config::ClusterParams::consistency) selects
//! the local-DC variants. Schema statements use the driver default.
//!
//! ## Retries
//!
//! Only setup DDL is retried (5 attempts, 1 s apart). Data-plane calls are
//! issued once; the driver handles transient RPC retries.

pub mod config;
mod error;
pub mod provider;
pub mod qnames;
pub mod query;
pub mod retry;
pub mod schema;
pub mod storage;

pub use config::{AppParams, ClusterParams, DataConsistency};
pub use provider::CassandraStorageProvider;
pub use qnames::CassandraQNameTable;
pub use retry::RetryPolicy;
pub use storage::CassandraAppStorage;
