use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// ICP configuration failed validation (e.g. `min > max` on a band).
    InvalidConfig(String),
    /// Bad request error (unparseable query or body).
    BadRequest(String),
    /// A discovery run is already in flight.
    Busy(String),
    /// Resource not found error.
    NotFound(String),
    /// Request is valid but does not fit the current state.
    Conflict(String),
    /// The lead source failed during a discovery run.
    DiscoveryFailed(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Busy(msg) => write!(f, "Busy: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::DiscoveryFailed(msg) => write!(f, "Discovery failed: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Innermost error, with any context wrappers peeled off.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidConfig(msg) => {
                tracing::warn!("Rejected ICP configuration: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Busy(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::DiscoveryFailed(msg) => {
                tracing::error!("Discovery failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Discovery failed".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return self.root().clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_and_root_unwraps() {
        let result: Result<(), AppError> = Err(AppError::Busy("run in flight".to_string()));
        let err = result.context("starting discovery").unwrap_err();

        assert_eq!(err.to_string(), "starting discovery: Busy: run in flight");
        assert_eq!(err.root(), &AppError::Busy("run in flight".to_string()));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::InvalidConfig("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Busy("x".into()), StatusCode::CONFLICT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::DiscoveryFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::WithContext {
                    source: Box::new(AppError::Conflict("x".into())),
                    context: "ctx".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                AppError::WithContext {
                    source: Box::new(AppError::WithContext {
                        source: Box::new(AppError::Busy("x".into())),
                        context: "inner".into(),
                    }),
                    context: "outer".into(),
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
