use crate::repositories::flow_states::FlowStateError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub enum CallbackError {
    InvalidState,
    MissingCode,
}

impl From<FlowStateError> for CallbackError {
    fn from(err: FlowStateError) -> Self {
        match err {
            FlowStateError::InvalidOrReused => CallbackError::InvalidState,
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let detail = match self {
            CallbackError::InvalidState => "Invalid state parameter",
            CallbackError::MissingCode => "Missing authorization code",
        };
        (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
    }
}
