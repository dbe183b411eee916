use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Which mutation a counter sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Edit,
    Delete,
    Refresh,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Edit => "edit",
            MutationKind::Delete => "delete",
            MutationKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Success,
    Rejected,
    Failed,
}

impl MutationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOutcome::Success => "success",
            MutationOutcome::Rejected => "rejected",
            MutationOutcome::Failed => "failed",
        }
    }
}

pub struct MetricsService {
    registry: Registry,
    mutations_total: IntCounterVec,
    log_lines_total: IntCounter,
}

impl MetricsService {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let mutations_total = IntCounterVec::new(
            Opts::new(
                "jambda_console_mutations_total",
                "Settled control plane mutations by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;

        let log_lines_total = IntCounter::new(
            "jambda_console_log_lines_total",
            "Log lines delivered to the console",
        )?;

        registry.register(Box::new(mutations_total.clone()))?;
        registry.register(Box::new(log_lines_total.clone()))?;

        Ok(Self {
            registry,
            mutations_total,
            log_lines_total,
        })
    }

    pub fn record_mutation(&self, kind: MutationKind, outcome: MutationOutcome) {
        self.mutations_total
            .with_label_values(&[kind.as_str(), outcome.as_str()])
            .inc();
        debug!(kind = kind.as_str(), outcome = outcome.as_str(), "Recorded mutation");
    }

    pub fn record_log_line(&self) {
        self.log_lines_total.inc();
    }

    pub fn mutation_count(&self, kind: MutationKind, outcome: MutationOutcome) -> u64 {
        self.mutations_total
            .with_label_values(&[kind.as_str(), outcome.as_str()])
            .get()
    }

    pub fn log_line_count(&self) -> u64 {
        self.log_lines_total.get()
    }

    pub fn get_prometheus_metrics(&self) -> Result<String, MetricsError> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}
