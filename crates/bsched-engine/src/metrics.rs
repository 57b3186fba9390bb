//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bundle lifecycle facade and query contract."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use bsched_logging::OperationOutcome;
use prometheus::{self, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

use crate::executor::Operation;

/// Metrics published by the bundle engine.
#[derive(Clone)]
pub struct EngineMetrics {
    operations: IntCounterVec,
    operation_duration: HistogramVec,
    log_lines: IntCounterVec,
}

impl EngineMetrics {
    /// Register all engine metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let operations = IntCounterVec::new(
            Opts::new(
                "bsched_engine_operations_total",
                "Total number of bundle engine operations by outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "bsched_engine_operation_duration_seconds",
            "Time spent inside bundle engine operations",
        )
        .buckets(prometheus::exponential_buckets(0.0005, 2.0, 12)?);
        let operation_duration = HistogramVec::new(histogram_opts, &["operation"])?;
        registry.register(Box::new(operation_duration.clone()))?;

        let log_lines = IntCounterVec::new(
            Opts::new(
                "bsched_engine_log_lines_total",
                "Total number of log lines written to callers",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(log_lines.clone()))?;

        Ok(Self {
            operations,
            operation_duration,
            log_lines,
        })
    }

    /// Count one finished operation.
    pub fn record(&self, operation: Operation, outcome: OperationOutcome, seconds: f64) {
        self.operations
            .with_label_values(&[operation.as_str(), outcome.as_str()])
            .inc();
        self.operation_duration
            .with_label_values(&[operation.as_str()])
            .observe(seconds);
    }

    /// Add to the number of log lines delivered.
    pub fn record_log_lines(&self, lines: u64) {
        self.log_lines
            .with_label_values(&[Operation::Log.as_str()])
            .inc_by(lines);
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_are_labelled_by_outcome() {
        let registry = Arc::new(Registry::new());
        let metrics = EngineMetrics::new(registry.clone()).unwrap();
        metrics.record(Operation::Kill, OperationOutcome::Success, 0.001);
        metrics.record(Operation::Kill, OperationOutcome::Rejected, 0.001);
        metrics.record(Operation::Kill, OperationOutcome::Rejected, 0.002);
        metrics.record_log_lines(3);

        let families = registry.gather();
        let ops = families
            .iter()
            .find(|family| family.get_name() == "bsched_engine_operations_total")
            .unwrap();
        let rejected = ops
            .get_metric()
            .iter()
            .find(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|label| label.get_name() == "outcome" && label.get_value() == "rejected")
            })
            .unwrap();
        assert_eq!(rejected.get_counter().get_value() as u64, 2);
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Arc::new(Registry::new());
        EngineMetrics::new(registry.clone()).unwrap();
        assert!(EngineMetrics::new(registry).is_err());
    }
}
