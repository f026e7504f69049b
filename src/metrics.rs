//! Prometheus metrics for observability
//!
//! Static metrics registered against the default registry. Scrape or dump
//! with `prometheus::gather()`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    /// Tool invocations, labelled by tool name and outcome
    pub static ref TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "shellvisor_tool_calls_total",
        "Tool invocations by tool name and outcome",
        &["tool", "outcome"]
    )
    .unwrap();

    /// Wall time of sandbox execs in seconds
    pub static ref EXEC_DURATION: Histogram = register_histogram!(
        "shellvisor_exec_duration_seconds",
        "Wall-clock duration of sandbox execs"
    )
    .unwrap();

    /// Containers currently alive
    pub static ref ACTIVE_CONTAINERS: IntGauge = register_int_gauge!(
        "shellvisor_active_containers",
        "Number of live conversation containers"
    )
    .unwrap();

    /// Bytes fetched from the network (after capping)
    pub static ref FETCH_BYTES: IntCounter = register_int_counter!(
        "shellvisor_fetch_bytes_total",
        "Response bytes delivered by the safe fetcher"
    )
    .unwrap();

    /// Agent loop terminations by stop reason
    pub static ref AGENT_STOPS: IntCounterVec = register_int_counter_vec!(
        "shellvisor_agent_stops_total",
        "Agent loop terminations by stop reason",
        &["reason"]
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        // Touching each static forces registration; duplicates would panic.
        TOOL_CALLS.with_label_values(&["shell_exec", "ok"]).inc();
        EXEC_DURATION.observe(0.01);
        ACTIVE_CONTAINERS.set(0);
        FETCH_BYTES.inc_by(128);
        AGENT_STOPS.with_label_values(&["completed"]).inc();
    }
}
