//! Application Storage Observability
//!
//! Prometheus metrics for the application storage adapter.
//!
//! # Usage
//!
//! ```no_run
//! use appstorage_observability::{exporter, metrics};
//!
//! // Register metrics once at startup
//! metrics::init();
//!
//! // Expose them from the host's HTTP surface
//! let body = exporter::render().unwrap();
//! ```

pub mod exporter;
pub mod metrics;

pub use metrics::{init as init_metrics, REGISTRY};

/// Initialize all observability components
pub fn init() {
    metrics::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_does_not_panic() {
        init();
        init_metrics();
    }

    #[test]
    fn test_registry_accessible() {
        init();
        let _registry = &*REGISTRY;
    }
}
