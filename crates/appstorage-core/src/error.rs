//! Storage Error Types
//!
//! This module defines all error types that can occur during storage operations.
//!
//! ## Error Categories
//!
//! ### Lookup Errors
//! - `AppNotFound`: The provider holds no storage for the requested application
//!
//! A missing row is **not** an error: `get_record` / `get_view_record` report it
//! as `Ok(false)`.
//!
//! ### Cluster Errors
//! - `Transport`: Cluster unreachable, connection lost, or request timed out
//! - `Query`: CQL-level failure (syntax, schema, unexpected row shape)
//!
//! ### Setup Errors
//! - `Setup`: Keyspace, table or session creation failed after retries. Wraps
//!   the underlying error together with the name of the failing object.
//! - `InvalidConfig`: Cluster or application parameters are unusable
//!
//! ### Caller Errors
//! - `Callback`: Raised by a reader callback. Any error a callback returns is
//!   propagated unchanged; this variant is a convenient way to wrap foreign errors.
//! - `InvalidQName`: A textual name is not of the `pkg.Entity` form
//! - `QNameIdsExhausted`: The 16-bit QName id space is used up
//!
//! ## Usage
//!
//! ```ignore
//! use appstorage_core::{AppStorage, StorageError};
//!
//! match provider.app_storage(&app) {
//!     Ok(storage) => { /* ... */ }
//!     Err(StorageError::AppNotFound(name)) => println!("unknown app {}", name),
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Boxed source error coming from a backend or a caller.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Application not found: {0}")]
    AppNotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("Query error: {0}")]
    Query(#[source] BoxError),

    #[error("Can't create {target}: {source}")]
    Setup {
        target: String,
        #[source]
        source: Box<StorageError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reader callback failed: {0}")]
    Callback(#[source] BoxError),

    #[error("Invalid QName: {0}")]
    InvalidQName(String),

    #[error("QName id space exhausted while registering {0}")]
    QNameIdsExhausted(String),
}

impl StorageError {
    /// Wrap `self` as the cause of a failed setup step on `target`.
    pub fn setup(target: impl Into<String>, source: StorageError) -> Self {
        StorageError::Setup {
            target: target.into(),
            source: Box::new(source),
        }
    }

    pub fn transport<E>(e: E) -> Self
    where
        E: Into<BoxError>,
    {
        StorageError::Transport(e.into())
    }

    pub fn query<E>(e: E) -> Self
    where
        E: Into<BoxError>,
    {
        StorageError::Query(e.into())
    }

    pub fn callback<E>(e: E) -> Self
    where
        E: Into<BoxError>,
    {
        StorageError::Callback(e.into())
    }

    /// True when the cluster could not be reached or did not answer in time.
    ///
    /// Hosts may re-issue the operation; the adapter itself never retries
    /// data-plane calls.
    pub fn is_transport(&self) -> bool {
        match self {
            StorageError::Transport(_) => true,
            StorageError::Setup { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}
