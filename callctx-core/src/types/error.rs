use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const DEFAULT_MESSAGE: &str = "Request cancelled by the client.";
const DEFAULT_SOURCE: &str = "client";

/// Canonical status codes carried by a [`TerminalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::Aborted => "ABORTED",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::Unimplemented => "UNIMPLEMENTED",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::DataLoss => "DATA_LOSS",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reason a context was cancelled.
///
/// Exactly one terminal error is latched per context; every listener observes
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalError {
    pub code: ErrorCode,
    pub message: String,
    /// Which side initiated the cancellation, e.g. `"client"`
    pub source: String,
}

impl TerminalError {
    pub fn new(code: ErrorCode, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: source.into(),
        }
    }

    /// The error recorded by a plain `cancel()`
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, DEFAULT_MESSAGE, DEFAULT_SOURCE)
    }

    /// The error recorded when a deadline timer fires
    pub fn deadline_exceeded(deadline: DateTime<Utc>) -> Self {
        Self::new(
            ErrorCode::Cancelled,
            format!(
                "Request exceeded deadline {}",
                deadline.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            DEFAULT_SOURCE,
        )
    }
}

impl Default for TerminalError {
    fn default() -> Self {
        Self::cancelled()
    }
}

impl fmt::Display for TerminalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (source: {})", self.code, self.message, self.source)
    }
}

impl std::error::Error for TerminalError {}

/// Partial override merged over [`TerminalError::cancelled`] by `cancel_with`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReason {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CancelReason {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Merge this override on top of `base`; fields set here take precedence.
    pub fn apply(self, base: TerminalError) -> TerminalError {
        TerminalError {
            code: self.code.unwrap_or(base.code),
            message: self.message.unwrap_or(base.message),
            source: self.source.unwrap_or(base.source),
        }
    }
}

impl From<TerminalError> for CancelReason {
    fn from(err: TerminalError) -> Self {
        Self {
            code: Some(err.code),
            message: Some(err.message),
            source: Some(err.source),
        }
    }
}

/// Error type for timer scheduling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("No timer driver: {0}")]
    NoRuntime(String),
}

/// Error type for context construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
