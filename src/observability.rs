use std::net::SocketAddr;

// ── RED metrics (operation-driven) ──────────────────────────────

/// Counter: unicast reservations submitted to the remote service.
pub const RESERVATIONS_CREATED_TOTAL: &str = "braid_reservations_created_total";

/// Counter: status polls issued while waiting for a terminal state.
pub const STATUS_POLLS_TOTAL: &str = "braid_status_polls_total";

/// Histogram: time from create to terminal state, in seconds.
pub const POLL_DURATION_SECONDS: &str = "braid_poll_duration_seconds";

/// Counter: anycast trial reservations (created and torn down again).
pub const ANYCAST_TRIALS_TOTAL: &str = "braid_anycast_trials_total";

/// Counter: per-member failures inside group fan-out operations.
pub const FANOUT_MEMBER_FAILURES_TOTAL: &str = "braid_fanout_member_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: full rewrites of the group lookup table.
pub const REGISTRY_REWRITES_TOTAL: &str = "braid_registry_rewrites_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
