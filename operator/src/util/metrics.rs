#![cfg(feature = "metrics")]

use prometheus::{HistogramVec, IntCounterVec, Opts, Registry, register_histogram_vec_with_registry};
use prometheus::register_int_counter_vec_with_registry;

/// Per-process Prometheus instrumentation for the Cluster Controller.
/// Mirrors the counter/histogram vocabulary the teacher's `ContextData`
/// used, relabeled for cluster-diagnostic-driven actions instead of
/// pod-phase actions.
pub struct ControllerMetrics {
    pub registry: Registry,
    pub reconcile_counter: IntCounterVec,
    pub read_histogram: HistogramVec,
    pub write_histogram: HistogramVec,
    pub action_counter: IntCounterVec,
}

impl ControllerMetrics {
    pub fn new(subsystem: &str) -> Self {
        let registry = Registry::new();

        let reconcile_counter = register_int_counter_vec_with_registry!(
            Opts::new(
                "reconcile_total",
                "Number of times a cluster was reconciled"
            )
            .subsystem(subsystem),
            &["cluster", "namespace"],
            registry
        )
        .expect("register reconcile_total");

        let read_histogram = register_histogram_vec_with_registry!(
            format!("{subsystem}_read_seconds"),
            "Time spent probing cluster state before acting",
            &["cluster", "namespace", "action"],
            registry
        )
        .expect("register read_seconds");

        let write_histogram = register_histogram_vec_with_registry!(
            format!("{subsystem}_write_seconds"),
            "Time spent applying an action",
            &["cluster", "namespace", "action"],
            registry
        )
        .expect("register write_seconds");

        let action_counter = register_int_counter_vec_with_registry!(
            Opts::new("action_total", "Number of actions taken per cluster").subsystem(subsystem),
            &["cluster", "namespace", "action"],
            registry
        )
        .expect("register action_total");

        ControllerMetrics {
            registry,
            reconcile_counter,
            read_histogram,
            write_histogram,
            action_counter,
        }
    }
}
