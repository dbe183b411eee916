use dashmap::DashMap;
use jambda_client::ResourceClient;
use jambda_metrics::{MetricsService, MutationKind, MutationOutcome, TracingService};
use jambda_models::{
    ClientError, DeleteReconciliation, DraftFunction, FieldIssue, FormField, FunctionResource,
    SubmissionError, ValidationErrors,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::forms::{validate, FormFlow, ValidDraft};
use crate::registry::SharedRegistry;

/// Mutation currently awaiting the control plane for a given resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMutation {
    Edit,
    Delete,
}

/// How an optimistic delete settled.
///
/// The local removal is applied in both cases; a failed remote call is
/// reported here so callers can pick their own reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Applied,
    AppliedWithPendingError(ClientError),
}

impl DeleteOutcome {
    pub fn error(&self) -> Option<&ClientError> {
        match self {
            DeleteOutcome::Applied => None,
            DeleteOutcome::AppliedWithPendingError(err) => Some(err),
        }
    }
}

/// Handle on the background half of an optimistic delete.
#[derive(Debug)]
pub struct DeleteTicket {
    external_id: String,
    handle: JoinHandle<DeleteOutcome>,
}

impl DeleteTicket {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn is_settled(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn outcome(self) -> DeleteOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => DeleteOutcome::AppliedWithPendingError(ClientError::transport(e)),
        }
    }
}

/// Turns validated intents into control plane calls and keeps the registry
/// coherent with the server.
#[derive(Clone)]
pub struct MutationCoordinator {
    client: Arc<dyn ResourceClient>,
    registry: SharedRegistry,
    in_flight: Arc<DashMap<String, PendingMutation>>,
    refresh_seq: Arc<AtomicU64>,
    metrics: Arc<MetricsService>,
    reconciliation: DeleteReconciliation,
}

impl MutationCoordinator {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        registry: SharedRegistry,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            client,
            registry,
            in_flight: Arc::new(DashMap::new()),
            refresh_seq: Arc::new(AtomicU64::new(0)),
            metrics,
            reconciliation: DeleteReconciliation::default(),
        }
    }

    pub fn with_reconciliation(mut self, reconciliation: DeleteReconciliation) -> Self {
        self.reconciliation = reconciliation;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsService> {
        &self.metrics
    }

    pub fn in_flight(&self, external_id: &str) -> Option<PendingMutation> {
        self.in_flight.get(external_id).map(|entry| *entry)
    }

    fn begin(&self, external_id: &str, mutation: PendingMutation) {
        self.in_flight.insert(external_id.to_string(), mutation);
    }

    fn settle(&self, external_id: &str, mutation: PendingMutation) {
        self.in_flight
            .remove_if(external_id, |_, pending| *pending == mutation);
    }

    /// Replaces the registry with the server's current list.
    ///
    /// Functions with a delete still in flight stay hidden, and a listing
    /// that completes after a newer one has been applied is discarded.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        let generation = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;

        match self.client.list().await {
            Ok(resources) => {
                let listing: Vec<FunctionResource> = resources
                    .into_iter()
                    .filter(|resource| {
                        self.in_flight(&resource.external_id) != Some(PendingMutation::Delete)
                    })
                    .collect();
                let count = listing.len();
                if !self.registry.apply_listing(generation, listing) {
                    debug!(generation, "Discarding listing superseded by a newer refresh");
                }
                self.metrics
                    .record_mutation(MutationKind::Refresh, MutationOutcome::Success);
                TracingService::log_registry_refreshed(count);
                Ok(count)
            }
            Err(e) => {
                self.metrics
                    .record_mutation(MutationKind::Refresh, MutationOutcome::Failed);
                warn!(error = %e, "Registry refresh failed");
                Err(e)
            }
        }
    }

    // The mutation already succeeded; a failed refresh only leaves the view stale.
    async fn refresh_after(&self, kind: MutationKind) {
        if let Err(e) = self.refresh().await {
            warn!(
                kind = kind.as_str(),
                error = %e,
                "Refresh after successful mutation failed; registry is stale"
            );
        }
    }

    /// Validates and creates a function, then re-lists from the server.
    pub async fn submit_create(
        &self,
        draft: &DraftFunction,
    ) -> Result<FunctionResource, SubmissionError> {
        match validate(draft, FormFlow::Create) {
            Ok(valid) => self.create(valid).await,
            Err(errors) => {
                self.metrics
                    .record_mutation(MutationKind::Create, MutationOutcome::Rejected);
                Err(errors.into())
            }
        }
    }

    /// Creates a function from an already validated draft.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: ValidDraft) -> Result<FunctionResource, SubmissionError> {
        let Some(payload) = draft.payload else {
            self.metrics
                .record_mutation(MutationKind::Create, MutationOutcome::Rejected);
            return Err(ValidationErrors {
                issues: vec![FieldIssue {
                    field: FormField::Payload,
                    message: "Please upload a function binary.",
                }],
            }
            .into());
        };

        match self
            .client
            .create(&draft.name, &draft.configuration, &payload)
            .await
        {
            Ok(created) => {
                self.metrics
                    .record_mutation(MutationKind::Create, MutationOutcome::Success);
                TracingService::log_function_created(&created);
                self.refresh_after(MutationKind::Create).await;
                Ok(created)
            }
            Err(e) => {
                self.metrics
                    .record_mutation(MutationKind::Create, MutationOutcome::Failed);
                warn!(error = %e, "Create failed");
                Err(e.into())
            }
        }
    }

    /// Sends an edited copy of a resource; the registry only changes through
    /// the refresh that follows a success.
    #[instrument(skip(self, resource), fields(external_id = %resource.external_id))]
    pub async fn submit_edit(
        &self,
        resource: &FunctionResource,
    ) -> Result<FunctionResource, SubmissionError> {
        self.begin(&resource.external_id, PendingMutation::Edit);

        let result = self
            .client
            .update(
                &resource.external_id,
                &resource.name,
                &resource.configuration,
            )
            .await;

        self.settle(&resource.external_id, PendingMutation::Edit);

        match result {
            Ok(updated) => {
                self.metrics
                    .record_mutation(MutationKind::Edit, MutationOutcome::Success);
                TracingService::log_function_updated(&updated);
                self.refresh_after(MutationKind::Edit).await;
                Ok(updated)
            }
            Err(e) => {
                self.metrics
                    .record_mutation(MutationKind::Edit, MutationOutcome::Failed);
                warn!(error = %e, "Edit failed");
                Err(e.into())
            }
        }
    }

    /// Removes the resource locally right away, then deletes it remotely in
    /// the background. The local removal is never rolled back.
    pub fn submit_delete(&self, external_id: &str) -> DeleteTicket {
        if self.registry.remove(external_id).is_none() {
            debug!(external_id = %external_id, "Deleting function absent from registry");
        }
        self.begin(external_id, PendingMutation::Delete);

        let this = self.clone();
        let id = external_id.to_string();
        let handle = tokio::spawn(async move { this.finish_delete(id).await });

        DeleteTicket {
            external_id: external_id.to_string(),
            handle,
        }
    }

    async fn finish_delete(&self, external_id: String) -> DeleteOutcome {
        let result = self.client.remove(&external_id).await;
        self.settle(&external_id, PendingMutation::Delete);

        match result {
            Ok(()) => {
                self.metrics
                    .record_mutation(MutationKind::Delete, MutationOutcome::Success);
                TracingService::log_function_deleted(&external_id);
                DeleteOutcome::Applied
            }
            Err(e) => {
                self.metrics
                    .record_mutation(MutationKind::Delete, MutationOutcome::Failed);
                TracingService::log_delete_diverged(&external_id, &e);
                if self.reconciliation == DeleteReconciliation::Refresh {
                    self.refresh_after(MutationKind::Delete).await;
                }
                DeleteOutcome::AppliedWithPendingError(e)
            }
        }
    }
}
