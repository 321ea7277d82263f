use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Control-plane counters, shared by the watch loops and controllers.
#[derive(Debug, Default)]
pub struct ControlPlaneMetrics {
    /// Watch events received across all prefixes.
    pub watch_events_total: AtomicU64,
    /// Events whose value could not be decoded or whose handler failed.
    pub watch_errors_total: AtomicU64,
    /// Watch subscriptions re-established after failure or end of stream.
    pub watch_reconnects_total: AtomicU64,
    pub pods_created_total: AtomicU64,
    pub pods_deleted_total: AtomicU64,
    /// Pods persisted without a node because nothing fit.
    pub pods_pending_total: AtomicU64,
    pub pod_restarts_total: AtomicU64,
}

impl ControlPlaneMetrics {
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 7] = [
            (
                "maden_watch_events_total",
                "Watch events received.",
                &self.watch_events_total,
            ),
            (
                "maden_watch_errors_total",
                "Watch events that failed to decode or handle.",
                &self.watch_errors_total,
            ),
            (
                "maden_watch_reconnects_total",
                "Watch subscriptions re-established.",
                &self.watch_reconnects_total,
            ),
            (
                "maden_pods_created_total",
                "Pods created by the orchestrator.",
                &self.pods_created_total,
            ),
            (
                "maden_pods_deleted_total",
                "Pods deleted by the orchestrator.",
                &self.pods_deleted_total,
            ),
            (
                "maden_pods_pending_total",
                "Pods persisted without a node assignment.",
                &self.pods_pending_total,
            ),
            (
                "maden_pod_restarts_total",
                "Automatic pod restarts triggered.",
                &self.pod_restarts_total,
            ),
        ];

        let mut out = String::with_capacity(1024);
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {}", value.load(Ordering::Relaxed));
        }
        out
    }
}
