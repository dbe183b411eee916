use jambda_models::{
    DraftFunction, FieldEdit, FieldIssue, FormField, FunctionConfiguration, FunctionType, Payload,
    RuntimeImage, SubmissionError, Trigger, ValidationErrors,
};

/// Which flow a form drives. Only creation uploads a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormFlow {
    Create,
    Edit,
}

impl FormFlow {
    pub fn requires_payload(&self) -> bool {
        matches!(self, FormFlow::Create)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Pristine,
    Touched,
    Validated(Validity),
}

/// A draft that passed every structural rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub external_id: Option<String>,
    pub name: String,
    pub configuration: FunctionConfiguration,
    pub payload: Option<Payload>,
}

const NAME_MISSING: &str = "Please provide a function name.";
const PAYLOAD_MISSING: &str = "Please upload a function binary.";
const TRIGGER_MISSING: &str = "Please select a trigger.";
const IMAGE_MISSING: &str = "Please select an image.";
const TYPE_MISSING: &str = "Please select a type.";
const PORT_MISSING: &str = "Please enter a port number.";
const PORT_INVALID: &str = "Port must be a positive integer.";

fn issue(field: FormField, message: &'static str) -> FieldIssue {
    FieldIssue { field, message }
}

/// The rule set shared by both flows. Pure; applied once per submit attempt.
pub fn validate(draft: &DraftFunction, flow: FormFlow) -> Result<ValidDraft, ValidationErrors> {
    let mut issues = Vec::new();

    let name = draft.name.trim();
    if name.is_empty() {
        issues.push(issue(FormField::Name, NAME_MISSING));
    }

    let payload = draft.payload.as_ref().filter(|payload| !payload.is_empty());
    if flow.requires_payload() && payload.is_none() {
        issues.push(issue(FormField::Payload, PAYLOAD_MISSING));
    }

    let trigger = draft.config.trigger.trim().parse::<Trigger>().ok();
    if trigger.is_none() {
        issues.push(issue(FormField::Trigger, TRIGGER_MISSING));
    }

    let image = draft.config.image.trim().parse::<RuntimeImage>().ok();
    if image.is_none() {
        issues.push(issue(FormField::Image, IMAGE_MISSING));
    }

    let kind = draft.config.kind.trim().parse::<FunctionType>().ok();
    if kind.is_none() {
        issues.push(issue(FormField::Kind, TYPE_MISSING));
    }

    let port_input = draft.config.port.trim();
    let port = if port_input.is_empty() {
        issues.push(issue(FormField::Port, PORT_MISSING));
        None
    } else {
        match port_input.parse::<u16>() {
            Ok(port) if port > 0 => Some(port),
            _ => {
                issues.push(issue(FormField::Port, PORT_INVALID));
                None
            }
        }
    };

    match (trigger, image, kind, port) {
        (Some(trigger), Some(image), Some(kind), Some(port)) if issues.is_empty() => Ok(ValidDraft {
            external_id: draft.external_id.clone(),
            name: name.to_string(),
            configuration: FunctionConfiguration {
                trigger,
                image,
                kind,
                port,
                env_vars: draft.config.env_vars.clone(),
            },
            payload: payload.cloned(),
        }),
        _ => Err(ValidationErrors { issues }),
    }
}

/// Identifies one submit attempt of one form instance.
pub type SubmissionId = u64;

/// Draft input plus validation and submission state for one flow.
#[derive(Debug, Clone)]
pub struct FormState {
    flow: FormFlow,
    draft: DraftFunction,
    state: ValidationState,
    issues: ValidationErrors,
    submission_error: Option<SubmissionError>,
    in_flight: Option<SubmissionId>,
}

impl FormState {
    pub fn new(flow: FormFlow, draft: DraftFunction) -> Self {
        Self {
            flow,
            draft,
            state: ValidationState::Pristine,
            issues: ValidationErrors::default(),
            submission_error: None,
            in_flight: None,
        }
    }

    pub fn flow(&self) -> FormFlow {
        self.flow
    }

    pub fn draft(&self) -> &DraftFunction {
        &self.draft
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// Per-field feedback from the last submit attempt.
    pub fn issues(&self) -> &ValidationErrors {
        &self.issues
    }

    /// Form-level error reported by the control plane.
    pub fn submission_error(&self) -> Option<&SubmissionError> {
        self.submission_error.as_ref()
    }

    pub fn in_flight(&self) -> Option<SubmissionId> {
        self.in_flight
    }

    pub fn edit(&mut self, edit: FieldEdit) {
        edit.apply(&mut self.draft);
        self.state = ValidationState::Touched;
    }

    pub fn attach_payload(&mut self, payload: Payload) {
        self.draft.payload = Some(payload);
        self.state = ValidationState::Touched;
    }

    /// Runs the rule set. On success the form is marked in flight under `id`.
    pub fn attempt_submit(&mut self, id: SubmissionId) -> Result<ValidDraft, ValidationErrors> {
        match validate(&self.draft, self.flow) {
            Ok(valid) => {
                self.state = ValidationState::Validated(Validity::Valid);
                self.issues = ValidationErrors::default();
                self.submission_error = None;
                self.in_flight = Some(id);
                Ok(valid)
            }
            Err(errors) => {
                self.state = ValidationState::Validated(Validity::Invalid);
                self.issues = errors.clone();
                Err(errors)
            }
        }
    }

    /// Whether a completion for `id` still belongs to this form.
    pub fn owns(&self, id: SubmissionId) -> bool {
        self.in_flight == Some(id)
    }

    /// Records a failed submission; the draft stays for correction.
    pub fn fail(&mut self, id: SubmissionId, error: SubmissionError) -> bool {
        if !self.owns(id) {
            return false;
        }
        self.in_flight = None;
        self.submission_error = Some(error);
        true
    }
}
