//! Core domain types.
//!
//! All identifiers are unsigned newtypes. Their wire shape (signed `bigint`,
//! `smallint`, `int` columns) is produced by the Offset Codec and by explicit
//! bit reinterpretation in backends, never by the host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StorageError};

/// Workspace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WsId(pub u64);

/// Record identifier within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

/// Position of an event in a PLog or WLog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offset(pub u64);

/// PLog partition (producer) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u16);

/// Dense id assigned to a [`QName`] by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QNameId(pub u16);

impl QNameId {
    /// Value stored in the `view_records.qname` smallint column.
    ///
    /// Ids above `i16::MAX` are stored with their bit pattern preserved.
    pub fn as_smallint(self) -> i16 {
        self.0 as i16
    }
}

/// Name of a logical tenant application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppName(pub String);

impl AppName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Qualified name `pkg.Entity` identifying a view kind or any other
/// registry-backed entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pkg: String,
    entity: String,
}

impl QName {
    pub fn new(pkg: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            entity: entity.into(),
        }
    }

    pub fn pkg(&self) -> &str {
        &self.pkg
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pkg, self.entity)
    }
}

impl FromStr for QName {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((pkg, entity))
                if !pkg.is_empty() && !entity.is_empty() && !entity.contains('.') =>
            {
                Ok(QName::new(pkg, entity))
            }
            _ => Err(StorageError::InvalidQName(s.to_string())),
        }
    }
}

/// Number of events a log read should deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCount {
    /// At most this many events.
    Exactly(u64),
    /// Everything from the start offset to the end of the log.
    ToTheEnd,
}

impl From<u64> for ReadCount {
    fn from(count: u64) -> Self {
        ReadCount::Exactly(count)
    }
}

/// Identifies one of the two event logs a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogId {
    PLog(PartitionId),
    WLog(WsId),
}

impl LogId {
    /// Table / metric label for this log kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LogId::PLog(_) => "plog",
            LogId::WLog(_) => "wlog",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_display_and_parse() {
        let name = QName::new("bo", "Article");
        assert_eq!(name.to_string(), "bo.Article");
        assert_eq!("bo.Article".parse::<QName>().unwrap(), name);
    }

    #[test]
    fn test_qname_parse_rejects_malformed() {
        for bad in ["", "noDot", ".Article", "bo.", "a.b.c"] {
            let err = bad.parse::<QName>().unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidQName(ref s) if s == bad),
                "unexpected result for {bad:?}: {err}"
            );
        }
    }

    #[test]
    fn test_qname_id_smallint_keeps_bits() {
        assert_eq!(QNameId(1).as_smallint(), 1);
        assert_eq!(QNameId(i16::MAX as u16).as_smallint(), i16::MAX);
        assert_eq!(QNameId(u16::MAX).as_smallint(), -1);
    }

    #[test]
    fn test_qname_serde_roundtrip() {
        let name = QName::new("test", "GetIdConcurrently");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(serde_json::from_str::<QName>(&json).unwrap(), name);
    }

    #[test]
    fn test_log_id_kind() {
        assert_eq!(LogId::PLog(PartitionId(3)).kind(), "plog");
        assert_eq!(LogId::WLog(WsId(3)).kind(), "wlog");
    }
}
