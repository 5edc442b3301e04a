//! Cluster and Application Configuration
//!
//! Two flat parameter sets:
//! - [`ClusterParams`]: where the cluster is and how to authenticate. Shared by
//!   every application of one provider.
//! - [`AppParams`]: the keyspace backing one application.
//!
//! Both deserialize with defaults for every omitted field, and
//! [`ClusterParams::from_env`] reads the `CASSANDRA_*` variables.
//!
//! ## Environment
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `CASSANDRA_HOSTS` | `hosts` (comma-separated) | `127.0.0.1` |
//! | `CASSANDRA_PORT` | `port` (0 = driver default) | `0` |
//! | `CASSANDRA_USERNAME` | `username` | empty (no auth) |
//! | `CASSANDRA_PASSWORD` | `password` | empty |

use appstorage_core::{Result, StorageError};
use scylla::statement::Consistency;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection timeout for every cluster session.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Replication factor used when none is configured.
pub const DEFAULT_REPLICATION_FACTOR: u32 = 1;

/// Longest keyspace name the server accepts.
const MAX_KEYSPACE_LEN: usize = 48;

/// Consistency used by data-plane statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataConsistency {
    /// Majority of all replicas.
    #[default]
    Quorum,
    /// Majority of replicas in the local data center.
    High,
    /// One replica in the local data center.
    Low,
}

impl DataConsistency {
    pub fn consistency(self) -> Consistency {
        match self {
            DataConsistency::Quorum => Consistency::Quorum,
            DataConsistency::High => Consistency::LocalQuorum,
            DataConsistency::Low => Consistency::LocalOne,
        }
    }
}

/// Cluster coordinates and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Comma-separated contact points.
    #[serde(default = "default_hosts")]
    pub hosts: String,
    /// CQL port; `0` keeps the driver default.
    #[serde(default)]
    pub port: u16,
    /// Username for password authentication; empty disables authentication.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub consistency: DataConsistency,
}

fn default_hosts() -> String {
    "127.0.0.1".to_string()
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            port: 0,
            username: String::new(),
            password: String::new(),
            consistency: DataConsistency::default(),
        }
    }
}

impl ClusterParams {
    /// Build from `CASSANDRA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut params = Self::default();

        if let Some(hosts) = lookup("CASSANDRA_HOSTS") {
            params.hosts = hosts;
        }
        if let Some(port) = lookup("CASSANDRA_PORT") {
            params.port = port.trim().parse().map_err(|_| {
                StorageError::InvalidConfig(format!("CASSANDRA_PORT is not a port: {port}"))
            })?;
        }
        if let Some(username) = lookup("CASSANDRA_USERNAME") {
            params.username = username;
        }
        if let Some(password) = lookup("CASSANDRA_PASSWORD") {
            params.password = password;
        }

        params.validate()?;
        Ok(params)
    }

    /// Contact points as handed to the driver.
    pub fn known_nodes(&self) -> Vec<String> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(|host| {
                if self.port > 0 {
                    format!("{host}:{}", self.port)
                } else {
                    host.to_string()
                }
            })
            .collect()
    }

    /// Whether a username was configured.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.known_nodes().is_empty() {
            return Err(StorageError::InvalidConfig(
                "At least one cluster host is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Keyspace parameters of one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppParams {
    pub keyspace: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    /// Full replication map, e.g. `{'class': 'NetworkTopologyStrategy', 'dc1': 3}`.
    /// Replaces the `SimpleStrategy` map built from `replication_factor`.
    #[serde(default)]
    pub replication: Option<String>,
}

fn default_replication_factor() -> u32 {
    DEFAULT_REPLICATION_FACTOR
}

impl AppParams {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            replication: None,
        }
    }

    pub fn with_replication(mut self, replication: impl Into<String>) -> Self {
        self.replication = Some(replication.into());
        self
    }

    /// Replication map for `create keyspace`.
    pub fn replication_map(&self) -> String {
        match &self.replication {
            Some(map) => map.trim().to_string(),
            None => format!(
                "{{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                self.replication_factor
            ),
        }
    }

    pub fn with_replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Keyspace names are interpolated into CQL text, so only unquoted
    /// identifiers are accepted.
    pub fn validate(&self) -> Result<()> {
        if !is_cql_identifier(&self.keyspace) {
            return Err(StorageError::InvalidConfig(format!(
                "Keyspace name is not a valid identifier: {:?}",
                self.keyspace
            )));
        }
        if let Some(map) = &self.replication {
            let map = map.trim();
            if !(map.starts_with('{') && map.ends_with('}')) {
                return Err(StorageError::InvalidConfig(format!(
                    "Replication must be a CQL map literal: {map}"
                )));
            }
        }
        if self.replication_factor == 0 {
            return Err(StorageError::InvalidConfig(
                "Replication factor must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_cql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= MAX_KEYSPACE_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_consistency_mapping() {
        assert_eq!(DataConsistency::default(), DataConsistency::Quorum);
        assert_eq!(DataConsistency::Quorum.consistency(), Consistency::Quorum);
        assert_eq!(DataConsistency::High.consistency(), Consistency::LocalQuorum);
        assert_eq!(DataConsistency::Low.consistency(), Consistency::LocalOne);
    }

    #[test]
    fn test_known_nodes_split_and_port() {
        let mut params = ClusterParams {
            hosts: "10.0.0.1, 10.0.0.2,,node3".to_string(),
            ..Default::default()
        };
        assert_eq!(params.known_nodes(), vec!["10.0.0.1", "10.0.0.2", "node3"]);

        params.port = 9142;
        assert_eq!(
            params.known_nodes(),
            vec!["10.0.0.1:9142", "10.0.0.2:9142", "node3:9142"]
        );
    }

    #[test]
    fn test_empty_hosts_rejected() {
        let params = ClusterParams {
            hosts: " , ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cluster_params_deserialize_with_defaults() {
        let params: ClusterParams = serde_json::from_str(r#"{"port": 9043}"#).unwrap();
        assert_eq!(params.hosts, "127.0.0.1");
        assert_eq!(params.port, 9043);
        assert!(!params.has_credentials());
        assert_eq!(params.consistency, DataConsistency::Quorum);

        let params: ClusterParams =
            serde_json::from_str(r#"{"hosts": "a,b", "consistency": "low"}"#).unwrap();
        assert_eq!(params.known_nodes(), vec!["a", "b"]);
        assert_eq!(params.consistency, DataConsistency::Low);
    }

    #[test]
    fn test_from_env_values() {
        let params = ClusterParams::from_lookup(lookup(&[
            ("CASSANDRA_HOSTS", "db1,db2"),
            ("CASSANDRA_PORT", "9042"),
            ("CASSANDRA_USERNAME", "cassandra"),
            ("CASSANDRA_PASSWORD", "secret"),
        ]))
        .unwrap();

        assert_eq!(params.known_nodes(), vec!["db1:9042", "db2:9042"]);
        assert!(params.has_credentials());
        assert_eq!(params.password, "secret");
    }

    #[test]
    fn test_from_env_defaults_and_bad_port() {
        let params = ClusterParams::from_lookup(lookup(&[])).unwrap();
        assert_eq!(params, ClusterParams::default());

        let err = ClusterParams::from_lookup(lookup(&[("CASSANDRA_PORT", "nine")])).unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(ref m) if m.contains("nine")));
    }

    #[test]
    fn test_app_params_defaults() {
        let params: AppParams = serde_json::from_str(r#"{"keyspace": "app1"}"#).unwrap();
        assert_eq!(params, AppParams::new("app1"));
        assert_eq!(params.replication_factor, 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_replication_map() {
        assert_eq!(
            AppParams::new("app1").with_replication_factor(3).replication_map(),
            "{'class': 'SimpleStrategy', 'replication_factor': 3}"
        );

        let params = AppParams::new("app1")
            .with_replication(" {'class': 'NetworkTopologyStrategy', 'dc1': 3} ");
        assert!(params.validate().is_ok());
        assert_eq!(
            params.replication_map(),
            "{'class': 'NetworkTopologyStrategy', 'dc1': 3}"
        );

        assert!(AppParams::new("app1")
            .with_replication("SimpleStrategy")
            .validate()
            .is_err());
    }

    #[test]
    fn test_keyspace_names() {
        for good in ["app1", "testspace_1", "A"] {
            assert!(AppParams::new(good).validate().is_ok(), "{good}");
        }
        for bad in ["", "wrong-keyspace", "1app", "_app", "app;drop", "a b"] {
            assert!(AppParams::new(bad).validate().is_err(), "{bad}");
        }
        assert!(AppParams::new("k".repeat(49)).validate().is_err());
        assert!(AppParams::new("app1")
            .with_replication_factor(0)
            .validate()
            .is_err());
    }
}
