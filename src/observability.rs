use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings successfully created. Labels: status (final status).
pub const BOOKINGS_CREATED_TOTAL: &str = "leash_bookings_created_total";

/// Counter: create/confirm attempts rejected for walker double-booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "leash_booking_conflicts_total";

/// Counter: status transitions applied. Labels: target.
pub const TRANSITIONS_TOTAL: &str = "leash_transitions_total";

/// Histogram: create_booking latency in seconds.
pub const CREATE_DURATION_SECONDS: &str = "leash_create_duration_seconds";

// ── Degraded-path metrics ───────────────────────────────────────

/// Counter: transient store failures that were retried.
pub const STORE_RETRIES_TOTAL: &str = "leash_store_retries_total";

/// Counter: pricing gateway failures (booking left unpriced).
pub const PRICING_FAILURES_TOTAL: &str = "leash_pricing_failures_total";

/// Counter: notification dispatch failures (logged, never surfaced).
pub const NOTIFICATION_FAILURES_TOTAL: &str = "leash_notification_failures_total";

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

/// Convenience for binaries embedding the engine: env-driven fmt subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
