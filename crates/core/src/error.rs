//! Error taxonomy shared by every tool and the workflow engine.
//!
//! Tools translate underlying I/O failures into these variants at their
//! boundary; the workflow engine consumes only taxonomy values and decides
//! retries from [`ErrorKind::is_retryable`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a tool or workflow failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Schema or semantic validation failed. Never retried.
    InvalidArguments,
    /// XML dispatcher rejected a foreign form variant. Never retried.
    MismatchedFormKind,
    /// XML malformed at the root. Never retried.
    InvalidFiling,
    /// EIN, filing, or profile not present.
    NotFound,
    /// Network error, 5xx, or other transient fault. Retried per policy.
    Transient,
    /// External rate limit hit. Retried after back-off.
    RateLimited,
    /// Cost reservation denied. Surfaced, not retried.
    BudgetExceeded,
    /// Cancellation signal tripped.
    Cancelled,
    /// Step or tool deadline reached.
    Timeout,
    /// Worker pool admission queue full. Retryable by the caller.
    QueueFull,
    /// An upstream workflow step failed; this step was skipped.
    DependencyFailed,
    /// A workflow input template referenced an output that does not exist.
    MissingInput,
}

impl ErrorKind {
    /// Whether the workflow engine may retry a failure of this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transient | ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::QueueFull
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::MismatchedFormKind => "mismatched_form_kind",
            ErrorKind::InvalidFiling => "invalid_filing",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transient => "transient",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timeout",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::DependencyFailed => "dependency_failed",
            ErrorKind::MissingInput => "missing_input",
        }
    }
}

/// A classified failure with enough context to surface to a caller.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{}: {message}", kind.as_str())]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    /// Workflow step that observed the failure, if any.
    pub step_id: Option<String>,
    /// Correlation id indexing structured logs.
    pub correlation_id: Option<Uuid>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step_id: None,
            correlation_id: None,
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArguments, message)
    }

    pub fn mismatched_form_kind(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MismatchedFormKind, message)
    }

    pub fn invalid_filing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFiling, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn budget_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BudgetExceeded, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancellation signal tripped")
    }

    pub fn timeout(what: impl std::fmt::Display, secs: f64) -> Self {
        Self::new(ErrorKind::Timeout, format!("{what} exceeded deadline of {secs:.1}s"))
    }

    pub fn queue_full(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueueFull, message)
    }

    pub fn dependency_failed(step: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::DependencyFailed, format!("upstream step '{step}' failed"))
    }

    pub fn missing_input(reference: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::MissingInput, format!("unresolvable reference '{reference}'"))
    }

    /// Attach the workflow step id that observed this failure.
    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    /// Attach the correlation id of the invocation.
    pub fn with_correlation(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

pub type Result<T, E = ToolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::QueueFull.is_retryable());

        assert!(!ErrorKind::InvalidArguments.is_retryable());
        assert!(!ErrorKind::BudgetExceeded.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
        assert!(!ErrorKind::MismatchedFormKind.is_retryable());
        assert!(!ErrorKind::MissingInput.is_retryable());
    }

    #[test]
    fn error_context_builders() {
        let err = ToolError::transient("connection reset")
            .with_step("screen_batch")
            .with_correlation(Uuid::nil());
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.step_id.as_deref(), Some("screen_batch"));
        assert!(err.to_string().contains("transient"));
    }
}
