use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Shown in place of a server message when no response was obtained.
pub const TRANSPORT_MESSAGE: &str = "could not reach the function control plane";

/// Error body returned by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{message}")]
    Remote { status_code: u16, message: String },

    #[error("could not reach the function control plane: {reason}")]
    Transport { reason: String },
}

impl ClientError {
    pub fn remote(status_code: u16, message: impl Into<String>) -> Self {
        ClientError::Remote {
            status_code,
            message: message.into(),
        }
    }

    pub fn transport(reason: impl fmt::Display) -> Self {
        ClientError::Transport {
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status_code, .. } => Some(*status_code),
            ClientError::Transport { .. } => None,
        }
    }

    /// Message suitable for a user-visible error slot.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Remote { message, .. } => message.clone(),
            ClientError::Transport { .. } => TRANSPORT_MESSAGE.to_string(),
        }
    }
}

/// Fields of a function form that carry structural validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Name,
    Payload,
    Trigger,
    Image,
    Kind,
    Port,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Payload => "zip",
            FormField::Trigger => "trigger",
            FormField::Image => "image",
            FormField::Kind => "type",
            FormField::Port => "port",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: FormField,
    pub message: &'static str,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("{} field(s) failed validation: {}", .issues.len(), fields(.issues))]
pub struct ValidationErrors {
    pub issues: Vec<FieldIssue>,
}

fn fields(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn contains(&self, field: FormField) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    pub fn message_for(&self, field: FormField) -> Option<&'static str> {
        self.issues
            .iter()
            .find(|issue| issue.field == field)
            .map(|issue| issue.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionErrorKind {
    Validation,
    Remote { status_code: u16 },
    Transport,
}

/// The one error channel a form displays, whatever went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail}")]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub detail: String,
}

impl SubmissionError {
    pub fn is_validation(&self) -> bool {
        self.kind == SubmissionErrorKind::Validation
    }
}

impl From<ClientError> for SubmissionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Remote {
                status_code,
                message,
            } => SubmissionError {
                kind: SubmissionErrorKind::Remote { status_code },
                detail: message,
            },
            ClientError::Transport { .. } => SubmissionError {
                kind: SubmissionErrorKind::Transport,
                detail: TRANSPORT_MESSAGE.to_string(),
            },
        }
    }
}

impl From<ValidationErrors> for SubmissionError {
    fn from(err: ValidationErrors) -> Self {
        SubmissionError {
            kind: SubmissionErrorKind::Validation,
            detail: err.to_string(),
        }
    }
}
