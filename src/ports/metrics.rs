use std::time::Duration;

/// Observability events emitted by the transformation dispatcher.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    fn filter_used(&self, filter: &str);

    fn transformation_completed(&self, filter_chain: &[String], elapsed: Duration);
}
