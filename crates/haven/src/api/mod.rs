//! HTTP handlers. Every session request goes through the [`SessionManager`],
//! so the actor ordering guarantees hold for API callers too.

pub mod admin_api;
pub mod session_api;

pub use admin_api::{healthz, metrics_text};
pub use session_api::{close_session, get_state, list_sessions, record_intervention, submit_turn};

use crate::error::SessionError;
use crate::session::SessionManager;
use crate::store::SessionStore;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>, store: Arc<dyn SessionStore>) -> Self {
        Self { manager, store }
    }
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub(crate) fn session_error(e: SessionError) -> Response {
    let status = match &e {
        SessionError::Closed(_) => StatusCode::CONFLICT,
        SessionError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}
