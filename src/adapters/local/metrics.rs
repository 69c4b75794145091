use crate::ports::metrics::MetricsSink;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Emits metrics as structured log events and keeps per-filter use counts.
#[derive(Debug, Default)]
pub struct TracingMetrics {
    filter_uses: Mutex<HashMap<String, u64>>,
}

impl TracingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_uses(&self, filter: &str) -> u64 {
        self.filter_uses
            .lock()
            .map(|counts| counts.get(filter).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl MetricsSink for TracingMetrics {
    fn filter_used(&self, filter: &str) {
        let total = match self.filter_uses.lock() {
            Ok(mut counts) => {
                let count = counts.entry(filter.to_string()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => return,
        };
        tracing::debug!(target: "metrics", filter, total, "filter used");
    }

    fn transformation_completed(&self, filter_chain: &[String], elapsed: Duration) {
        tracing::info!(
            target: "metrics",
            filters = %filter_chain.join(","),
            elapsed_ms = elapsed.as_millis() as u64,
            "transformation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_filter_uses() {
        let metrics = TracingMetrics::new();
        metrics.filter_used("gray");
        metrics.filter_used("gray");
        metrics.filter_used("flip");
        assert_eq!(metrics.filter_uses("gray"), 2);
        assert_eq!(metrics.filter_uses("flip"), 1);
        assert_eq!(metrics.filter_uses("blur"), 0);
    }
}
