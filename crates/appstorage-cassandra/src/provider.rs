//! Storage Provider & Session Lifecycle
//!
//! The provider connects to the cluster once per application, makes sure the
//! application's keyspace and tables exist, prepares statements and keeps the
//! resulting [`CassandraAppStorage`] handles for the life of the process.
//!
//! ## Setup sequence (per application)
//!
//! ```text
//! validate params
//!   └─► open session (known nodes, 30s connect timeout, password auth)
//!         └─► create keyspace ─► create 5 tables   (each retried 5 × 1s)
//!               └─► prepare statements
//!                     └─► cache[app] = storage
//! ```
//!
//! Any failure aborts construction with a [`StorageError::Setup`] naming the
//! application; the cause names the keyspace or table when DDL failed.
//!
//! ## Usage
//!
//! ```ignore
//! let provider = CassandraStorageProvider::new(
//!     ClusterParams::from_env()?,
//!     [(AppName::from("app1"), AppParams::new("app1"))],
//! )
//! .await?;
//!
//! let storage = provider.app_storage(&AppName::from("app1"))?;
//! // ...
//! provider.release();
//! ```

use scylla::transport::ExecutionProfile;
use scylla::{Session, SessionBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use appstorage_core::{AppName, AppStorage, AppStorageProvider, Result, StorageError};

use crate::config::{AppParams, ClusterParams, CONNECTION_TIMEOUT};
use crate::error::session_error;
use crate::retry::RetryPolicy;
use crate::schema::create_schema;
use crate::storage::CassandraAppStorage;

/// Hands out one [`CassandraAppStorage`] per configured application.
///
/// The application map is built during [`new`](Self::new) and is read-only
/// afterwards.
pub struct CassandraStorageProvider {
    cache: HashMap<AppName, Arc<CassandraAppStorage>>,
}

impl CassandraStorageProvider {
    /// Connect and set up every application, with the default setup retry
    /// policy.
    pub async fn new(
        cluster: ClusterParams,
        apps: impl IntoIterator<Item = (AppName, AppParams)>,
    ) -> Result<Self> {
        Self::with_retry_policy(cluster, apps, RetryPolicy::default()).await
    }

    pub async fn with_retry_policy(
        cluster: ClusterParams,
        apps: impl IntoIterator<Item = (AppName, AppParams)>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        appstorage_observability::init();
        cluster.validate()?;

        let mut cache = HashMap::new();
        for (app, params) in apps {
            let storage = open_app(&cluster, &app, &params, &policy)
                .await
                .map_err(|e| StorageError::setup(format!("storage for application {app}"), e))?;
            cache.insert(app, Arc::new(storage));
        }

        info!(apps = cache.len(), "Storage provider ready");
        Ok(Self { cache })
    }

    /// Applications this provider serves.
    pub fn apps(&self) -> impl Iterator<Item = &AppName> {
        self.cache.keys()
    }

    /// Drop every storage handle held by the provider.
    ///
    /// A session is owned by its [`CassandraAppStorage`] and closes when the
    /// last handle to it is dropped. Handles the host still holds from
    /// [`app_storage`](AppStorageProvider::app_storage) stay usable after
    /// `release`; drop them first to close every session.
    pub fn release(self) {
        let apps = self.cache.len();
        drop(self.cache);
        info!(apps, "Storage provider released");
    }
}

impl AppStorageProvider for CassandraStorageProvider {
    fn app_storage(&self, app: &AppName) -> Result<Arc<dyn AppStorage>> {
        self.cache
            .get(app)
            .map(|storage| Arc::clone(storage) as Arc<dyn AppStorage>)
            .ok_or_else(|| StorageError::AppNotFound(app.to_string()))
    }
}

async fn connect(cluster: &ClusterParams) -> Result<Session> {
    let profile = ExecutionProfile::builder()
        .consistency(cluster.consistency.consistency())
        .build();

    let mut builder = SessionBuilder::new()
        .known_nodes(cluster.known_nodes())
        .connection_timeout(CONNECTION_TIMEOUT)
        .default_execution_profile_handle(profile.into_handle());
    if cluster.has_credentials() {
        builder = builder.user(&cluster.username, &cluster.password);
    }

    builder.build().await.map_err(session_error)
}

async fn open_app(
    cluster: &ClusterParams,
    app: &AppName,
    params: &AppParams,
    policy: &RetryPolicy,
) -> Result<CassandraAppStorage> {
    params.validate()?;

    let session = connect(cluster).await?;
    create_schema(&session, params, policy).await?;

    let storage = CassandraAppStorage::prepare(
        app.clone(),
        params.keyspace.clone(),
        Arc::new(session),
        cluster.consistency.consistency(),
    )
    .await?;

    info!(app = %app, keyspace = %params.keyspace, "Application storage ready");
    Ok(storage)
}
