//! Driver error classification.
//!
//! Driver failures are kept verbatim as the source of a [`StorageError`]; this
//! module only decides which kind they are:
//!
//! | Driver error | Kind |
//! |---|---|
//! | server rejected the statement (syntax, schema, auth, ...) | `Query` |
//! | unavailable / overloaded / bootstrapping / server-side timeouts | `Transport` |
//! | connection, I/O and client-side timeouts | `Transport` |
//! | row could not be decoded into the expected shape | `Query` |

use appstorage_core::StorageError;
use scylla::transport::errors::{DbError, NewSessionError, QueryError};
use scylla::transport::iterator::NextRowError;

pub(crate) fn query_error(e: QueryError) -> StorageError {
    match &e {
        QueryError::DbError(db, _) if is_unavailable(db) => StorageError::transport(e),
        QueryError::DbError(..) | QueryError::BadQuery(_) => StorageError::query(e),
        _ => StorageError::transport(e),
    }
}

fn is_unavailable(db: &DbError) -> bool {
    matches!(
        db,
        DbError::Unavailable { .. }
            | DbError::Overloaded
            | DbError::IsBootstrapping
            | DbError::ReadTimeout { .. }
            | DbError::WriteTimeout { .. }
    )
}

pub(crate) fn session_error(e: NewSessionError) -> StorageError {
    StorageError::transport(e)
}

/// A result set did not have the expected shape.
pub(crate) fn row_error<E>(e: E) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::query(e)
}

pub(crate) fn next_row_error(e: NextRowError) -> StorageError {
    match e {
        NextRowError::QueryError(e) => query_error(e),
        other => row_error(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scylla::transport::errors::BadQuery;

    #[test]
    fn test_server_rejections_are_query_errors() {
        let err = query_error(QueryError::DbError(
            DbError::SyntaxError,
            "line 1:0 no viable alternative".to_string(),
        ));
        assert!(matches!(err, StorageError::Query(_)));

        let err = query_error(QueryError::BadQuery(BadQuery::Other(
            "too many values".to_string(),
        )));
        assert!(matches!(err, StorageError::Query(_)));
    }

    #[test]
    fn test_availability_failures_are_transport_errors() {
        for db_error in [DbError::Overloaded, DbError::IsBootstrapping] {
            assert!(query_error(QueryError::DbError(db_error, String::new())).is_transport());
        }
        assert!(query_error(QueryError::TimeoutError).is_transport());
    }

    #[test]
    fn test_source_is_kept_verbatim() {
        let err = query_error(QueryError::DbError(
            DbError::Invalid,
            "unconfigured table qnames".to_string(),
        ));
        assert!(err.to_string().contains("unconfigured table qnames"));
    }
}
