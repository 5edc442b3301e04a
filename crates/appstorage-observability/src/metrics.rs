use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Data Plane Metrics
    // ============================================================================

    /// Total queries issued to the cluster, by storage operation
    pub static ref STORAGE_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("appstorage_queries_total", "Total storage queries"),
        &["operation"] // get_record, put_record, read_log_part, ...
    ).expect("metric can be created");

    /// Failed queries, by storage operation
    pub static ref STORAGE_QUERY_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("appstorage_query_errors_total", "Total failed storage queries"),
        &["operation"]
    ).expect("metric can be created");

    /// Query latency
    pub static ref STORAGE_QUERY_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new("appstorage_query_latency_seconds", "Storage query latency in seconds")
            .buckets(vec![0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["operation"]
    ).expect("metric can be created");

    /// Log sub-queries (one partition each), by log kind
    pub static ref LOG_PARTS_READ_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("appstorage_log_parts_read_total", "Total log partitions scanned"),
        &["log"] // plog, wlog
    ).expect("metric can be created");

    /// Events delivered to log reader callbacks, by log kind
    pub static ref LOG_EVENTS_READ_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("appstorage_log_events_read_total", "Total log events delivered to readers"),
        &["log"]
    ).expect("metric can be created");

    // ============================================================================
    // Registry & Lifecycle Metrics
    // ============================================================================

    /// QName ids allocated by this process
    pub static ref QNAME_ALLOCATIONS_TOTAL: IntCounter = IntCounter::new(
        "appstorage_qname_allocations_total",
        "Total QName ids allocated"
    ).expect("metric can be created");

    /// QName allocations lost to a concurrent writer
    pub static ref QNAME_ALLOCATION_CONFLICTS_TOTAL: IntCounter = IntCounter::new(
        "appstorage_qname_allocation_conflicts_total",
        "Total QName allocations resolved in favour of another writer"
    ).expect("metric can be created");

    /// Retried schema statements during setup
    pub static ref SETUP_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "appstorage_setup_retries_total",
        "Total retried setup statements"
    ).expect("metric can be created");

    /// Open cluster sessions
    pub static ref SESSIONS_OPEN: IntGauge = IntGauge::new(
        "appstorage_sessions_open",
        "Number of open cluster sessions"
    ).expect("metric can be created");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(STORAGE_QUERIES_TOTAL.clone()))
            .expect("queries_total can be registered");
        REGISTRY
            .register(Box::new(STORAGE_QUERY_ERRORS_TOTAL.clone()))
            .expect("query_errors_total can be registered");
        REGISTRY
            .register(Box::new(STORAGE_QUERY_LATENCY.clone()))
            .expect("query_latency can be registered");
        REGISTRY
            .register(Box::new(LOG_PARTS_READ_TOTAL.clone()))
            .expect("log_parts_read_total can be registered");
        REGISTRY
            .register(Box::new(LOG_EVENTS_READ_TOTAL.clone()))
            .expect("log_events_read_total can be registered");
        REGISTRY
            .register(Box::new(QNAME_ALLOCATIONS_TOTAL.clone()))
            .expect("qname_allocations_total can be registered");
        REGISTRY
            .register(Box::new(QNAME_ALLOCATION_CONFLICTS_TOTAL.clone()))
            .expect("qname_allocation_conflicts_total can be registered");
        REGISTRY
            .register(Box::new(SETUP_RETRIES_TOTAL.clone()))
            .expect("setup_retries_total can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_OPEN.clone()))
            .expect("sessions_open can be registered");
    });
}
