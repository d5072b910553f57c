//! The result of processing one event.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Processed,
    Ignored,
    Failed,
}

/// Why an event did not lead to any action. None of these need attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    UnsupportedEvent,
    NoRule,
    MissingIssue,
    MissingProject,
    LookupFailed,
    ProjectMismatch,
    EmptyWatchers,
}

/// Why an applicable event could not be acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedReason {
    MissingInstallation,
    MissingTeam,
    OpenapiError,
    UnknownError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    Ignored(IgnoredReason),
    Failed(FailedReason),
}

impl IgnoredReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoredReason::UnsupportedEvent => "unsupported_event",
            IgnoredReason::NoRule => "no_rule",
            IgnoredReason::MissingIssue => "missing_issue",
            IgnoredReason::MissingProject => "missing_project",
            IgnoredReason::LookupFailed => "lookup_failed",
            IgnoredReason::ProjectMismatch => "project_mismatch",
            IgnoredReason::EmptyWatchers => "empty_watchers",
        }
    }
}

impl FailedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedReason::MissingInstallation => "missing_installation",
            FailedReason::MissingTeam => "missing_team",
            FailedReason::OpenapiError => "openapi_error",
            FailedReason::UnknownError => "unknown_error",
        }
    }
}

impl Outcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Outcome::Processed => OutcomeStatus::Processed,
            Outcome::Ignored(_) => OutcomeStatus::Ignored,
            Outcome::Failed(_) => OutcomeStatus::Failed,
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Outcome::Processed => None,
            Outcome::Ignored(reason) => Some(reason.as_str()),
            Outcome::Failed(reason) => Some(reason.as_str()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{:?}/{reason}", self.status()),
            None => write!(f, "{:?}", self.status()),
        }
    }
}

/// Serializes as `{"status": "ignored", "reason": "no_rule"}`; `reason` is
/// omitted for processed events.
impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            status: OutcomeStatus,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<&'static str>,
        }

        Wire {
            status: self.status(),
            reason: self.reason(),
        }
        .serialize(serializer)
    }
}
