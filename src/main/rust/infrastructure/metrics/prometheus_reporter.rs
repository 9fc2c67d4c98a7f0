use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "webrtc_active_sessions",
        "Number of peer sessions currently held in the pool"
    ).expect("metric can be created");
    pub static ref SESSIONS_TOTAL: IntCounter = IntCounter::new(
        "webrtc_sessions_total",
        "Total number of peer sessions registered since server start"
    ).expect("metric can be created");
    pub static ref SESSIONS_EVICTED: IntCounter = IntCounter::new(
        "webrtc_sessions_evicted_total",
        "Sessions closed to keep the pool within its connection limit"
    ).expect("metric can be created");
    pub static ref SESSIONS_FAILED: IntCounter = IntCounter::new(
        "webrtc_sessions_failed_total",
        "Sessions whose connection reached the failed state"
    ).expect("metric can be created");
    pub static ref NEGOTIATION_FAILURES: IntCounter = IntCounter::new(
        "webrtc_negotiation_failures_total",
        "Offers that could not be answered"
    ).expect("metric can be created");
    pub static ref SNAPSHOTS_WRITTEN: IntCounter = IntCounter::new(
        "webrtc_snapshots_written_total",
        "Snapshots encoded and stored"
    ).expect("metric can be created");
    pub static ref SNAPSHOT_FAILURES: IntCounter = IntCounter::new(
        "webrtc_snapshot_failures_total",
        "Snapshot attempts that failed to encode or write"
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(ACTIVE_SESSIONS.clone()))?;
        REGISTRY.register(Box::new(SESSIONS_TOTAL.clone()))?;
        REGISTRY.register(Box::new(SESSIONS_EVICTED.clone()))?;
        REGISTRY.register(Box::new(SESSIONS_FAILED.clone()))?;
        REGISTRY.register(Box::new(NEGOTIATION_FAILURES.clone()))?;
        REGISTRY.register(Box::new(SNAPSHOTS_WRITTEN.clone()))?;
        REGISTRY.register(Box::new(SNAPSHOT_FAILURES.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_session_registered(&self) {
        ACTIVE_SESSIONS.inc();
        SESSIONS_TOTAL.inc();
    }

    fn report_session_removed(&self) {
        ACTIVE_SESSIONS.dec();
    }

    fn report_session_evicted(&self) {
        SESSIONS_EVICTED.inc();
    }

    fn report_session_failed(&self) {
        SESSIONS_FAILED.inc();
    }

    fn report_negotiation_failed(&self) {
        NEGOTIATION_FAILURES.inc();
    }

    fn report_snapshot_written(&self) {
        SNAPSHOTS_WRITTEN.inc();
    }

    fn report_snapshot_failed(&self) {
        SNAPSHOT_FAILURES.inc();
    }
}
