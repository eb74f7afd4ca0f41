use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use magalia_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

/// Failure returned by every JSON handler. Server-side causes are logged here
/// and never echoed to the caller.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        let detail = error.to_string();
        let mapped = error.into_interface(correlation_id);
        match &mapped {
            InterfaceError::BadRequest { .. } | InterfaceError::NotFound { .. } => warn!(
                event_name = "api.request.rejected",
                correlation_id = %correlation_id,
                error = %detail,
                "request rejected"
            ),
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => error!(
                event_name = "api.request.failed",
                correlation_id = %correlation_id,
                error = %detail,
                "request failed"
            ),
        }
        Self(mapped)
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.0.user_message(),
            detail: self.0.client_detail().map(str::to_string),
            correlation_id: self.0.correlation_id().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
