//! Application Storage Core
//!
//! Backend-independent half of the application storage adapter: the operation
//! contract a host application programs against, and the algorithms every
//! backend shares.
//!
//! ## Purpose
//!
//! A host application persists three kinds of data per application (tenant):
//! - **Records**: mutable blobs addressed by `(workspace, record id)`
//! - **Event logs**: immutable, offset-ordered events, either per producer
//!   partition (PLog) or per workspace (WLog)
//! - **Views**: secondary entries addressed by
//!   `(workspace, view QName, partition key, clustering columns)`
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   Host application   │
//! └──────────┬───────────┘
//!            │ Arc<dyn AppStorage>
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────────────────┐
//! │  AppStorage (trait)  │ ──► │ LogRangePlan · ClusteringRange│
//! │  read_plog/read_view │     │ QNameRegistry · row pumps    │
//! └──────────┬───────────┘     └──────────────────────────────┘
//!            │ point ops + read_log_part + scan_view
//!     ┌──────┴────────┐
//!     ▼               ▼
//!  MemAppStorage   CassandraAppStorage (appstorage-cassandra)
//! ```
//!
//! ## Key Layout
//!
//! Record ids and log offsets are split by the [`offset`] codec into a
//! partition number and a 12-bit clustering position, so one storage
//! partition never holds more than 4096 rows and a log read never spans more
//! than one partition per sub-query.
//!
//! ## Usage Example
//!
//! ```ignore
//! use appstorage_core::{AppName, AppStorageProvider, MemStorageProvider, Offset,
//!                       PartitionId, ReadCount};
//! use tokio_util::sync::CancellationToken;
//!
//! let provider = MemStorageProvider::new([AppName::from("app1")]);
//! let storage = provider.app_storage(&AppName::from("app1"))?;
//!
//! storage.put_plog_event(PartitionId(1), Offset(0), b"created").await?;
//!
//! let cancel = CancellationToken::new();
//! storage
//!     .read_plog(&cancel, PartitionId(1), Offset(0), ReadCount::ToTheEnd, &mut |offset, event| {
//!         println!("{}: {} bytes", offset.0, event.len());
//!         Ok(())
//!     })
//!     .await?;
//! ```
//!
//! ## Thread Safety
//!
//! Storages are `Send + Sync` and shared via `Arc<dyn AppStorage>`. The only
//! internal lock guards QName allocation; reads and writes go straight to the
//! backend.

pub mod error;
pub mod mem;
pub mod offset;
pub mod plan;
pub mod range;
pub mod registry;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "tck"))]
pub mod tck;

pub use error::{BoxError, Result, StorageError};
pub use mem::{MemAppStorage, MemStorageProvider};
pub use offset::{crack, uncrack, PARTITION_BITS, PARTITION_RECORD_COUNT};
pub use plan::{LogPart, LogRangePlan};
pub use range::ClusteringRange;
pub use registry::{MemQNameTable, QNameRegistry, QNameTable};
pub use storage::{
    AppStorage, AppStorageProvider, LogReaderCallback, PartOutcome, ViewReaderCallback,
};
pub use types::*;
