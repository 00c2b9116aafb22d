//! Prometheus metrics for dbweb-auth

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const METRIC_UPTIME: &str = "dbweb_auth_uptime_seconds";
const METRIC_INFO: &str = "dbweb_auth_info";

// Authentication
const METRIC_LOGINS: &str = "dbweb_auth_logins_total";
const METRIC_LOGOUTS: &str = "dbweb_auth_logouts_total";

// Administration
const METRIC_ADMIN_OPERATIONS: &str = "dbweb_auth_admin_operations_total";

// Role cache
const METRIC_ROLE_CACHE_LOOKUPS: &str = "dbweb_auth_role_cache_lookups_total";
const METRIC_ROLE_CACHE_SIZE: &str = "dbweb_auth_role_cache_size";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Process uptime in seconds");
    describe_gauge!(METRIC_INFO, "Build information (always 1)");

    describe_counter!(METRIC_LOGINS, "Login attempts by provider and outcome");
    describe_counter!(METRIC_LOGOUTS, "Completed logouts");

    describe_counter!(
        METRIC_ADMIN_OPERATIONS,
        "Mutating admin operations by operation and outcome"
    );

    describe_counter!(METRIC_ROLE_CACHE_LOOKUPS, "Role cache lookups by result");
    describe_gauge!(METRIC_ROLE_CACHE_SIZE, "Current role cache size (entries)");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a login attempt; `outcome` is `success` or an error kind.
pub fn record_login(provider: &str, outcome: &'static str) {
    counter!(
        METRIC_LOGINS,
        "provider" => provider.to_owned(),
        "outcome" => outcome,
    )
    .increment(1);
}

pub fn record_logout() {
    counter!(METRIC_LOGOUTS).increment(1);
}

pub fn record_admin_operation(operation: &'static str, outcome: &'static str) {
    counter!(
        METRIC_ADMIN_OPERATIONS,
        "operation" => operation,
        "outcome" => outcome,
    )
    .increment(1);
}

pub fn record_role_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(METRIC_ROLE_CACHE_LOOKUPS, "result" => result).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn set_role_cache_size(size: u64) {
    gauge!(METRIC_ROLE_CACHE_SIZE).set(size as f64);
}
