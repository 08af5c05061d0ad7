//! Structured error types shared by the storage, AI, and HTTP layers.

use serde::Serialize;
use std::fmt;

/// Maximum number of characters of an upstream error body carried in an error.
const UPSTREAM_BODY_LIMIT: usize = 400;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing required field, self-reference, unknown provider, bad input.
    InvalidArgument,
    /// A unique relation already exists.
    Conflict,
    /// Unknown identity on read/update/delete.
    NotFound,
    /// Non-success response from an external AI or pricing source.
    UpstreamError,
    /// Success response whose body could not be parsed into the expected shape.
    BadUpstreamResponse,
    /// Unexpected store or parsing failure. Detail is logged, never serialized.
    InternalError,
}

/// Structured error surfaced across the boundary contract.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Upstream HTTP status, set only for UpstreamError.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
            status: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, format!("{} is required", field)).with_field(field)
    }

    pub fn project_not_found(project_id: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Project not found: {}", project_id),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Task not found: {}", task_id))
    }

    pub fn blocker_not_found(task_id: &str, blocker_id: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("No blocker relation {} -> {}", task_id, blocker_id),
        )
    }

    pub fn self_block(task_id: &str) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Task {} cannot block itself", task_id),
        )
        .with_field("blocker_id")
    }

    pub fn duplicate_blocker(task_id: &str, blocker_id: &str) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!("Task {} is already blocked by {}", task_id, blocker_id),
        )
    }

    pub fn unknown_provider(name: &str) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Unknown provider: {}", name),
        )
        .with_field("provider")
    }

    pub fn no_credential(provider: &str) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!("No API key configured for provider: {}", provider),
        )
        .with_field("api_key")
    }

    /// Upstream returned a non-success status. The body is truncated so a
    /// huge error page cannot balloon the response.
    pub fn upstream(provider: &str, status: u16, body: &str) -> Self {
        let mut err = Self::new(
            ErrorCode::UpstreamError,
            format!("{} request failed with HTTP {}", provider, status),
        );
        err.status = Some(status);
        let trimmed = body.trim();
        if !trimmed.is_empty() {
            err.details = Some(trimmed.chars().take(UPSTREAM_BODY_LIMIT).collect());
        }
        err
    }

    pub fn bad_upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadUpstreamResponse, message)
    }

    /// Generic internal error. The concrete failure must be logged by the
    /// caller; raw store or adapter error text never reaches a client.
    pub fn internal() -> Self {
        Self::new(ErrorCode::InternalError, "Internal error")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them. Typed errors raised
// inside the db/ai layers travel through anyhow and are recovered here;
// everything else collapses to a logged InternalError.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => {
                tracing::error!("internal error: {:#}", err);
                ApiError::internal()
            }
        }
    }
}
