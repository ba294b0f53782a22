//! Error types for graph compilation and provisioning.
//!
//! Runtime failures reported by the backend are classified so the executor
//! can decide whether to retry and the report can tell the user what to do.

use crate::kind::ResourceKind;
use crate::types::Scope;
use crate::validate::ValidationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which end of an edge an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    Source,
    Sink,
}

impl fmt::Display for EdgeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Sink => f.write_str("sink"),
        }
    }
}

/// Structural problems that block apply
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphError {
    #[error("duplicate node id '{id}'")]
    DuplicateNodeId { id: String },

    #[error("edge #{edge} references unknown {side} node '{id}'")]
    UnknownEndpoint { edge: usize, side: EdgeSide, id: String },

    #[error("dependency cycle: {}", .nodes.join(" -> "))]
    DependencyCycle { nodes: Vec<String> },

    #[error("{field} '{value}' must be 1-{max} lowercase letters or digits", max = crate::types::Scope::MAX_PART_LEN)]
    InvalidScope { field: &'static str, value: String },

    #[error("{kind} name '{name}' for node {node} does not match {pattern}")]
    NonConformingName {
        node: String,
        kind: ResourceKind,
        name: String,
        pattern: &'static str,
    },
}

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Another operation holds the resource (transient, retryable)
    Conflict,
    /// Timeouts, throttling, connection resets (transient, retryable)
    TransientNetwork,
    /// Subscription or regional quota reached
    QuotaExceeded,
    /// A globally unique name is taken
    NameCollision,
    /// The request itself is invalid for the backend
    ConfigurationInvalid,
    /// Anything else; surfaced verbatim
    Unknown,
}

const NAME_COLLISION_CODES: &[&str] = &[
    "alreadytaken",
    "alreadyexists",
    "namenotavailable",
    "nameunavailable",
    "nameinuse",
];
const QUOTA_CODES: &[&str] = &[
    "quota",
    "countexceeded",
    "limitexceeded",
    "maxnumberof",
    "skunotavailable",
];
const CONFLICT_CODES: &[&str] = &["conflict", "anotheroperationinprogress", "operationinprogress", "409"];
const TRANSIENT_CODES: &[&str] = &[
    "timeout",
    "serviceunavailable",
    "toomanyrequests",
    "internalservererror",
    "networkerror",
    "connectionreset",
    "badgateway",
    "429",
    "500",
    "502",
    "503",
    "504",
];
const CONFIGURATION_CODES: &[&str] = &[
    "invalid",
    "badrequest",
    "validationerror",
    "locationnotavailable",
    "disallowedbypolicy",
    "missingrequired",
    "400",
];

const NAME_COLLISION_MESSAGES: &[&str] = &["already taken", "is not available", "already in use", "already exists"];
const QUOTA_MESSAGES: &[&str] = &["quota", "limit exceeded", "exceeded the maximum", "exceeds the limit"];
const CONFLICT_MESSAGES: &[&str] = &["another operation", "in progress", "conflict"];
const TRANSIENT_MESSAGES: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "temporarily unavailable",
    "could not resolve",
    "try again later",
];
const CONFIGURATION_MESSAGES: &[&str] = &["invalid", "not supported", "not allowed", "disallowed by policy", "required"];

impl ErrorClass {
    /// Whether the executor retries this class with backoff.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict | Self::TransientNetwork)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::TransientNetwork => "transient network",
            Self::QuotaExceeded => "quota exceeded",
            Self::NameCollision => "name collision",
            Self::ConfigurationInvalid => "configuration invalid",
            Self::Unknown => "unknown",
        }
    }

    /// Actionable advice for the report.
    pub const fn advice(self) -> &'static str {
        match self {
            Self::Conflict => "Wait for the other operation on the resource to finish and apply again",
            Self::TransientNetwork => "Check connectivity to the backend and apply again",
            Self::QuotaExceeded => "Request a quota increase or pick another location",
            Self::NameCollision => "Choose a more specific name; this one is taken globally",
            Self::ConfigurationInvalid => "Fix the node properties or location and apply again",
            Self::Unknown => "Check the raw error message for details",
        }
    }

    /// Classify a structured backend failure: codes first, then messages.
    pub fn classify(code: &str, message: &str) -> Self {
        let code = code.to_ascii_lowercase();
        let by_code = [
            (Self::NameCollision, NAME_COLLISION_CODES),
            (Self::QuotaExceeded, QUOTA_CODES),
            (Self::Conflict, CONFLICT_CODES),
            (Self::TransientNetwork, TRANSIENT_CODES),
            (Self::ConfigurationInvalid, CONFIGURATION_CODES),
        ];
        if !code.is_empty()
            && let Some((class, _)) = by_code
                .iter()
                .find(|(_, needles)| needles.iter().any(|n| code.contains(n)))
        {
            return *class;
        }

        let message = message.to_lowercase();
        let by_message = [
            (Self::NameCollision, NAME_COLLISION_MESSAGES),
            (Self::QuotaExceeded, QUOTA_MESSAGES),
            (Self::Conflict, CONFLICT_MESSAGES),
            (Self::TransientNetwork, TRANSIENT_MESSAGES),
            (Self::ConfigurationInvalid, CONFIGURATION_MESSAGES),
        ];
        by_message
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| message.contains(n)))
            .map_or(Self::Unknown, |(class, _)| *class)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by a backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("[{code}] {message}")]
pub struct BackendFailure {
    pub code: String,
    pub message: String,
}

impl BackendFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A classified backend failure as it appears in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{class}: [{code}] {message}")]
pub struct Failure {
    pub class: ErrorClass,
    pub code: String,
    pub message: String,
}

impl Failure {
    pub fn is_retryable(&self) -> bool {
        self.class.is_retryable()
    }

    /// Deleting something that is already gone counts as deleted
    pub fn is_absent(&self) -> bool {
        let code = self.code.to_ascii_lowercase();
        code == "notfound" || code == "resourcenotfound" || code == "404"
    }
}

impl From<BackendFailure> for Failure {
    fn from(failure: BackendFailure) -> Self {
        Self {
            class: ErrorClass::classify(&failure.code, &failure.message),
            code: failure.code,
            message: failure.message,
        }
    }
}

/// Errors that stop a provisioning operation before or around execution
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("graph has {} validation error(s)", .0.errors.len())]
    Invalid(Box<ValidationReport>),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to create worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("could not lock scope {scope}: {message}")]
    Lock { scope: Scope, message: String },

    #[error("plan store failed for scope {scope}: {message}")]
    Store { scope: Scope, message: String },

    #[error("could not list resources tagged {scope}: {failure}")]
    Inventory { scope: Scope, failure: Failure },
}

impl ProvisionError {
    pub(crate) fn lock(scope: &Scope, err: &anyhow::Error) -> Self {
        Self::Lock {
            scope: scope.clone(),
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn store(scope: &Scope, err: &anyhow::Error) -> Self {
        Self::Store {
            scope: scope.clone(),
            message: format!("{err:#}"),
        }
    }
}
