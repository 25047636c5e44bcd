use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use crate::workflow::Stage;

pub type SpinupResult<T> = Result<T, SpinupError>;

/// Uniform record of a failed remote API call.
///
/// `status` is `None` when the request never produced a response
/// (connection refused, DNS failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub message: String,
    pub body: Option<String>,
}

impl ApiFailure {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// Build a failure from a non-2xx response.
    ///
    /// When the body is a provider error document
    /// (`{"id": "...", "message": "..."}`) its message is used,
    /// otherwise the canonical reason for the status code.
    #[must_use]
    pub fn from_response(status: u16, reason: &str, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["message"].as_str().map(String::from))
            .unwrap_or_else(|| reason.to_string());

        Self {
            status: Some(status),
            message,
            body: (!body.trim().is_empty()).then(|| body.to_string()),
        }
    }

    /// `4xx`, `5xx` or `transport`.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self.status {
            Some(s) if (400..500).contains(&s) => "4xx",
            Some(s) if s >= 500 => "5xx",
            Some(_) => "unexpected",
            None => "transport",
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => write!(f, "transport error: {}", self.message),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpinupError {
    #[error("configuration missing: {0}")]
    MissingConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("API request failed: {0}")]
    Api(ApiFailure),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("firewall not found: {0}")]
    FirewallNotFound(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("subdomain not found: {0}")]
    SubdomainNotFound(String),

    #[error("failed to attach firewall {firewall} to instance {instance_id}: {reason}")]
    FirewallAttach {
        firewall: String,
        instance_id: u64,
        reason: String,
    },

    #[error("{ip}:{port} did not respond after {attempts} attempts")]
    NetworkTimeout { ip: String, port: u16, attempts: u32 },

    #[error("instance {0} has no public IPv4 address")]
    NoPublicAddress(u64),

    #[error("timed out after {waited:?} waiting for {stage}")]
    Timeout { stage: String, waited: Duration },

    #[error("cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("remote step '{step}' exited with code {code}")]
    RemoteStep {
        step: String,
        code: i32,
        stderr: String,
    },

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("command failed: {command}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("background task failed: {0}")]
    TaskFailed(String),

    #[error("{stage} failed: {source}")]
    Workflow {
        stage: Stage,
        #[source]
        source: Box<Self>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<ApiFailure> for SpinupError {
    fn from(failure: ApiFailure) -> Self {
        Self::Api(failure)
    }
}

impl SpinupError {
    /// Attach the workflow stage in which this error surfaced.
    /// Errors that already carry a stage are left as they are.
    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        match self {
            Self::Workflow { .. } => self,
            other => Self::Workflow {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage a workflow error was raised in, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Workflow { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
