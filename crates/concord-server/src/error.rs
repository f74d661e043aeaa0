use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use concord_core::ConcordError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit statuses
// ---------------------------------------------------------------------------

/// A concept operation reported a failure on a directly invoked route.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

/// No synchronization answered a request within the response timeout.
#[derive(Debug)]
struct TimeoutError(String);

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TimeoutError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self(TimeoutError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequestError>().is_some() {
            StatusCode::BAD_REQUEST
        } else if self.0.downcast_ref::<NotFoundError>().is_some() {
            StatusCode::NOT_FOUND
        } else if self.0.downcast_ref::<TimeoutError>().is_some() {
            StatusCode::GATEWAY_TIMEOUT
        } else if let Some(e) = self.0.downcast_ref::<ConcordError>() {
            match e {
                ConcordError::ConceptNotFound(_) | ConcordError::OperationNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                ConcordError::Json(_) => StatusCode::BAD_REQUEST,
                ConcordError::DuplicateConcept(_)
                | ConcordError::DuplicateOperation { .. }
                | ConcordError::DuplicateRule(_)
                | ConcordError::UnknownConcept { .. }
                | ConcordError::UnknownOperation { .. }
                | ConcordError::UnknownField { .. }
                | ConcordError::UnboundVariable { .. }
                | ConcordError::EmptyWhen(_)
                | ConcordError::NoFixpoint { .. }
                | ConcordError::InvalidConfig(_)
                | ConcordError::Io(_)
                | ConcordError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
