#![allow(dead_code)]

use jambda_control::{Console, MutationCoordinator, ScriptedLogSource, SharedRegistry};
use jambda_metrics::MetricsService;
use jambda_models::DeleteReconciliation;
use jambda_testsupport::FakeControlPlane;
use std::sync::Arc;
use std::time::Duration;

pub fn coordinator(fake: &FakeControlPlane) -> MutationCoordinator {
    let metrics = Arc::new(MetricsService::new().unwrap());
    MutationCoordinator::new(Arc::new(fake.clone()), SharedRegistry::new(), metrics)
}

pub fn refreshing_coordinator(fake: &FakeControlPlane) -> MutationCoordinator {
    coordinator(fake).with_reconciliation(DeleteReconciliation::Refresh)
}

pub fn console(fake: &FakeControlPlane, script: &[&str]) -> Console {
    let source = ScriptedLogSource::new(
        script.iter().map(|line| line.to_string()).collect(),
        Duration::from_millis(20),
    );
    Console::new(coordinator(fake), Arc::new(source))
}
