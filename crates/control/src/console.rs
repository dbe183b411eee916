use jambda_metrics::{MutationKind, MutationOutcome};
use jambda_models::{
    ClientError, DraftFunction, FieldEdit, FieldIssue, FunctionResource, Payload,
    SubmissionError, DEFAULT_PORT,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::{DeleteOutcome, MutationCoordinator};
use crate::forms::{FormFlow, FormState, SubmissionId, ValidationState};
use crate::logs::{LogEvent, LogSource, LogState, LogStreamer};

/// Which modal surface is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    None,
    New,
    Edit,
    ConfirmDelete,
}

/// Result of asynchronous work, delivered back to the console.
#[derive(Debug)]
pub enum ConsoleEvent {
    Refreshed(Result<usize, ClientError>),
    Created {
        submission: SubmissionId,
        result: Result<FunctionResource, SubmissionError>,
    },
    Edited {
        submission: SubmissionId,
        external_id: String,
        result: Result<FunctionResource, SubmissionError>,
    },
    DeleteSettled {
        external_id: String,
        outcome: DeleteOutcome,
    },
    Log(LogEvent),
}

impl ConsoleEvent {
    // Log lines keep arriving on their own; everything else answers one spawned call.
    fn is_task_completion(&self) -> bool {
        !matches!(self, ConsoleEvent::Log(_))
    }
}

/// An optimistic delete the control plane did not confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub external_id: String,
    pub error: ClientError,
}

/// The whole console state, driven by intents and by `ConsoleEvent`s.
pub struct Console {
    coordinator: MutationCoordinator,
    logs: LogStreamer,
    selection: Option<String>,
    modal: Modal,
    create_form: Option<FormState>,
    edit_form: Option<FormState>,
    edit_base: Option<FunctionResource>,
    delete_failures: Vec<DeleteFailure>,
    last_error: Option<String>,
    next_submission: SubmissionId,
    outstanding: usize,
    default_port: u16,
    events_tx: mpsc::UnboundedSender<ConsoleEvent>,
    events_rx: mpsc::UnboundedReceiver<ConsoleEvent>,
}

impl Console {
    pub fn new(coordinator: MutationCoordinator, log_source: Arc<dyn LogSource>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            coordinator,
            logs: LogStreamer::new(log_source),
            selection: None,
            modal: Modal::None,
            create_form: None,
            edit_form: None,
            edit_base: None,
            delete_failures: Vec::new(),
            last_error: None,
            next_submission: 0,
            outstanding: 0,
            default_port: DEFAULT_PORT,
            events_tx,
            events_rx,
        }
    }

    /// Port pre-filled into new drafts.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    // Exposed state

    pub fn registry_snapshot(&self) -> Vec<FunctionResource> {
        self.coordinator.registry().snapshot()
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// The selected resource, resolved against the registry.
    pub fn selected(&self) -> Option<FunctionResource> {
        self.selection
            .as_deref()
            .and_then(|id| self.coordinator.registry().get(id))
    }

    pub fn modal(&self) -> Modal {
        self.modal
    }

    fn form(&self, flow: FormFlow) -> Option<&FormState> {
        match flow {
            FormFlow::Create => self.create_form.as_ref(),
            FormFlow::Edit => self.edit_form.as_ref(),
        }
    }

    pub fn draft(&self, flow: FormFlow) -> Option<&DraftFunction> {
        self.form(flow).map(FormState::draft)
    }

    pub fn validation_state(&self, flow: FormFlow) -> ValidationState {
        self.form(flow)
            .map(FormState::state)
            .unwrap_or(ValidationState::Pristine)
    }

    pub fn field_issues(&self, flow: FormFlow) -> &[FieldIssue] {
        self.form(flow)
            .map(|form| form.issues().issues.as_slice())
            .unwrap_or(&[])
    }

    pub fn submission_error(&self, flow: FormFlow) -> Option<&SubmissionError> {
        self.form(flow).and_then(FormState::submission_error)
    }

    pub fn is_submitting(&self, flow: FormFlow) -> bool {
        self.form(flow)
            .map(|form| form.in_flight().is_some())
            .unwrap_or(false)
    }

    pub fn log_lines(&self) -> &[String] {
        self.logs.lines()
    }

    pub fn log_state(&self) -> &LogState {
        self.logs.state()
    }

    pub fn delete_failures(&self) -> &[DeleteFailure] {
        &self.delete_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // Intents

    pub fn refresh(&mut self) {
        let coordinator = self.coordinator.clone();
        self.spawn(async move { ConsoleEvent::Refreshed(coordinator.refresh().await) });
    }

    /// Selects a known resource and starts streaming its logs.
    pub fn select_function(&mut self, external_id: &str) -> bool {
        if self.selection.as_deref() == Some(external_id) {
            return true;
        }
        if self.coordinator.registry().get(external_id).is_none() {
            debug!(external_id = %external_id, "Ignoring selection of unknown function");
            return false;
        }

        self.selection = Some(external_id.to_string());
        self.start_logs(external_id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.logs.stop();
    }

    /// Re-streams logs for the current selection.
    pub fn stream_logs(&mut self) -> bool {
        match self.selection.clone() {
            Some(external_id) => {
                self.start_logs(external_id);
                true
            }
            None => false,
        }
    }

    fn start_logs(&mut self, external_id: String) {
        let tx = self.events_tx.clone();
        self.logs
            .start(&external_id, move |event| tx.send(ConsoleEvent::Log(event)).is_ok());
    }

    pub fn open_new(&mut self) {
        let mut draft = DraftFunction::new();
        draft.config.port = self.default_port.to_string();
        self.create_form = Some(FormState::new(FormFlow::Create, draft));
        self.modal = Modal::New;
    }

    pub fn close_new(&mut self) {
        self.create_form = None;
        if self.modal == Modal::New {
            self.modal = Modal::None;
        }
        self.refresh();
    }

    pub fn edit_new(&mut self, edit: FieldEdit) {
        if let Some(form) = self.create_form.as_mut() {
            form.edit(edit);
        }
    }

    pub fn attach_payload(&mut self, payload: Payload) {
        if let Some(form) = self.create_form.as_mut() {
            form.attach_payload(payload);
        }
    }

    /// Validates the create form and, when valid, submits it in the background.
    /// Returns `None` for an invalid draft or while a submission is already in flight.
    pub fn submit_new(&mut self) -> Option<SubmissionId> {
        let submission = self.next_submission + 1;
        let form = self.create_form.as_mut()?;
        if let Some(pending) = form.in_flight() {
            debug!(pending, "Create already submitted; ignoring repeat submit");
            return None;
        }

        match form.attempt_submit(submission) {
            Ok(valid) => {
                self.next_submission = submission;
                let coordinator = self.coordinator.clone();
                self.spawn(async move {
                    ConsoleEvent::Created {
                        submission,
                        result: coordinator.create(valid).await,
                    }
                });
                Some(submission)
            }
            Err(errors) => {
                debug!(issues = errors.issues.len(), "Create form rejected locally");
                self.coordinator.metrics().record_mutation(
                    MutationKind::Create,
                    MutationOutcome::Rejected,
                );
                None
            }
        }
    }

    /// Opens the edit form on a copy of the selected resource.
    pub fn open_edit(&mut self) -> bool {
        let Some(resource) = self.selected() else {
            return false;
        };
        self.edit_form = Some(FormState::new(
            FormFlow::Edit,
            DraftFunction::from_resource(&resource),
        ));
        self.edit_base = Some(resource);
        self.modal = Modal::Edit;
        true
    }

    pub fn close_edit(&mut self) {
        self.edit_form = None;
        self.edit_base = None;
        if self.modal == Modal::Edit {
            self.modal = Modal::None;
        }
        self.refresh();
    }

    pub fn edit_existing(&mut self, edit: FieldEdit) {
        if let Some(form) = self.edit_form.as_mut() {
            form.edit(edit);
        }
    }

    pub fn submit_edit(&mut self) -> Option<SubmissionId> {
        let submission = self.next_submission + 1;
        let base = self.edit_base.clone()?;
        let form = self.edit_form.as_mut()?;
        if let Some(pending) = form.in_flight() {
            debug!(pending, "Edit already submitted; ignoring repeat submit");
            return None;
        }

        match form.attempt_submit(submission) {
            Ok(valid) => {
                self.next_submission = submission;
                let resource = FunctionResource {
                    name: valid.name,
                    configuration: valid.configuration,
                    ..base
                };
                let coordinator = self.coordinator.clone();
                self.spawn(async move {
                    let result = coordinator.submit_edit(&resource).await;
                    ConsoleEvent::Edited {
                        submission,
                        external_id: resource.external_id,
                        result,
                    }
                });
                Some(submission)
            }
            Err(errors) => {
                debug!(issues = errors.issues.len(), "Edit form rejected locally");
                self.coordinator.metrics().record_mutation(
                    MutationKind::Edit,
                    MutationOutcome::Rejected,
                );
                None
            }
        }
    }

    pub fn request_delete(&mut self) -> bool {
        if self.selection.is_none() {
            return false;
        }
        self.modal = Modal::ConfirmDelete;
        true
    }

    pub fn cancel_delete(&mut self) {
        if self.modal == Modal::ConfirmDelete {
            self.modal = Modal::None;
        }
    }

    /// Deletes the selected resource optimistically. Returns its external id.
    pub fn confirm_delete(&mut self) -> Option<String> {
        if self.modal != Modal::ConfirmDelete {
            return None;
        }
        self.modal = Modal::None;
        let external_id = self.selection.take()?;
        self.logs.stop();

        let ticket = self.coordinator.submit_delete(&external_id);
        self.spawn(async move {
            let external_id = ticket.external_id().to_string();
            ConsoleEvent::DeleteSettled {
                external_id,
                outcome: ticket.outcome().await,
            }
        });
        Some(external_id)
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    // Event loop

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ConsoleEvent> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            // The console may already be gone; nothing left to update then.
            let _ = tx.send(task.await);
        });
    }

    /// Number of spawned calls whose results have not been applied yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Waits for the next event without applying it.
    pub async fn next_event(&mut self) -> Option<ConsoleEvent> {
        self.events_rx.recv().await
    }

    /// Applies every event that is already queued. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Applies events until every spawned call has reported back.
    pub async fn settle(&mut self) {
        while self.outstanding > 0 {
            match self.events_rx.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }

    pub fn apply(&mut self, event: ConsoleEvent) {
        if event.is_task_completion() {
            self.outstanding = self.outstanding.saturating_sub(1);
        }

        match event {
            ConsoleEvent::Refreshed(Ok(count)) => {
                debug!(count, "Console registry refreshed");
                self.drop_vanished_selection();
            }
            ConsoleEvent::Refreshed(Err(e)) => {
                self.last_error = Some(e.user_message());
            }
            ConsoleEvent::Created { submission, result } => {
                self.apply_created(submission, result);
            }
            ConsoleEvent::Edited {
                submission,
                external_id,
                result,
            } => self.apply_edited(submission, &external_id, result),
            ConsoleEvent::DeleteSettled {
                external_id,
                outcome,
            } => match outcome {
                DeleteOutcome::Applied => {
                    debug!(external_id = %external_id, "Delete confirmed");
                }
                DeleteOutcome::AppliedWithPendingError(error) => {
                    self.last_error = Some(error.user_message());
                    self.delete_failures.push(DeleteFailure { external_id, error });
                }
            },
            ConsoleEvent::Log(event) => {
                if self.logs.accept(event) {
                    self.coordinator.metrics().record_log_line();
                }
            }
        }
    }

    fn apply_created(
        &mut self,
        submission: SubmissionId,
        result: Result<FunctionResource, SubmissionError>,
    ) {
        let owned = self
            .create_form
            .as_ref()
            .map(|form| form.owns(submission))
            .unwrap_or(false);
        if !owned {
            debug!(submission, "Ignoring stale create completion");
            return;
        }

        match result {
            Ok(created) => {
                info!(external_id = %created.external_id, "Function created from console");
                self.create_form = None;
                if self.modal == Modal::New {
                    self.modal = Modal::None;
                }
            }
            Err(error) => {
                if let Some(form) = self.create_form.as_mut() {
                    form.fail(submission, error);
                }
            }
        }
    }

    fn apply_edited(
        &mut self,
        submission: SubmissionId,
        external_id: &str,
        result: Result<FunctionResource, SubmissionError>,
    ) {
        let owned = self
            .edit_form
            .as_ref()
            .map(|form| form.owns(submission))
            .unwrap_or(false);
        if !owned {
            debug!(submission, external_id = %external_id, "Ignoring stale edit completion");
            return;
        }

        match result {
            Ok(_) => {
                self.edit_form = None;
                self.edit_base = None;
                if self.modal == Modal::Edit {
                    self.modal = Modal::None;
                }
            }
            Err(error) => {
                warn!(external_id = %external_id, error = %error, "Edit rejected");
                if let Some(form) = self.edit_form.as_mut() {
                    form.fail(submission, error);
                }
            }
        }
    }

    fn drop_vanished_selection(&mut self) {
        let vanished = self
            .selection
            .as_deref()
            .map(|id| self.coordinator.registry().get(id).is_none())
            .unwrap_or(false);
        if vanished {
            debug!(selection = ?self.selection, "Selected function no longer listed");
            self.clear_selection();
        }
    }
}
