//! Session endpoints.

use super::{error_response, session_error, AppState};
use crate::clinical::{InterventionEvent, RiskLevel};
use crate::pipeline::TurnOutcome;
use crate::session::SessionView;
use crate::store::SessionRecord;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Messages longer than this are rejected before they reach the gate.
const MAX_MESSAGE_CHARS: usize = 4_000;

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct InterventionRequest {
    pub performed_by: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct InterventionResponse {
    pub session_id: String,
    pub risk: RiskLevel,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionRecord>,
}

/// Runs one turn. If the client disconnects the handler future is dropped,
/// which cancels the turn through its ticket.
pub async fn submit_turn(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnOutcome>, Response> {
    if req.message.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Message cannot be empty"));
    }
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(error_response(StatusCode::PAYLOAD_TOO_LARGE, "Message is too long"));
    }

    let ticket = state.manager.submit(&session_id, req.message).await.map_err(session_error)?;
    let outcome = ticket.outcome().await.map_err(session_error)?;
    Ok(Json(outcome))
}

pub async fn get_state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, Response> {
    state.manager.view(&session_id).await.map(Json).map_err(session_error)
}

/// Records the human follow-up that lifts a crisis lock.
pub async fn record_intervention(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<InterventionRequest>,
) -> Result<Json<InterventionResponse>, Response> {
    if req.performed_by.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "performed_by is required"));
    }

    info!("Intervention recorded for session {} by {}", session_id, req.performed_by);
    let event = InterventionEvent {
        performed_by: req.performed_by,
        note: req.note,
        recorded_at: Utc::now(),
    };
    let risk = state
        .manager
        .resolve_crisis(&session_id, event)
        .await
        .map_err(session_error)?;
    Ok(Json(InterventionResponse { session_id, risk }))
}

pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, Response> {
    let closed = state.manager.close(&session_id).await.map_err(session_error)?;
    if !closed {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Session not active: {}", session_id),
        ));
    }
    Ok(Json(serde_json::json!({ "success": true, "id": session_id })))
}

pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<SessionsResponse>, Response> {
    match state.store.list().await {
        Ok(sessions) => Ok(Json(SessionsResponse { sessions })),
        Err(e) => {
            error!("Failed to list sessions: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineSettings, TurnPipeline};
    use crate::session::{Disposition, SessionManager};
    use crate::store::{InMemorySessionStore, SessionStore};
    use crate::testing::{CollectingTraceSink, StubGenerator, StubRetriever};
    use std::sync::Arc;
    use std::time::Duration;

    fn app_state() -> AppState {
        let pipeline = TurnPipeline::new(
            Arc::new(StubGenerator::always("That sounds heavy. I'm here.")),
            Arc::new(StubRetriever::empty()),
            Arc::new(CollectingTraceSink::default()),
            PipelineSettings {
                generation_timeout: Duration::from_secs(1),
                tool_timeout: Duration::from_millis(200),
            },
        );
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let manager = SessionManager::new(Arc::new(pipeline), store.clone(), 8, 1);
        AppState::new(Arc::new(manager), store)
    }

    fn turn(message: &str) -> Json<TurnRequest> {
        Json(TurnRequest { message: message.to_string() })
    }

    #[tokio::test]
    async fn test_submit_turn_returns_outcome() {
        let state = app_state();
        let Json(outcome) = submit_turn(State(state.clone()), Path("s1".into()), turn("I feel sad today"))
            .await
            .unwrap();
        assert_eq!(outcome.turn_index, 1);
        assert_eq!(outcome.disposition, Disposition::Completed);
        assert_eq!(outcome.response, "That sounds heavy. I'm here.");
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let err = submit_turn(State(app_state()), Path("s1".into()), turn("   ")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_crisis_then_intervention() {
        let state = app_state();
        let Json(outcome) = submit_turn(State(state.clone()), Path("s1".into()), turn("I want to kill myself"))
            .await
            .unwrap();
        assert_eq!(outcome.disposition, Disposition::Blocked);
        assert_eq!(outcome.risk, RiskLevel::High);

        let Json(view) = get_state(State(state.clone()), Path("s1".into())).await.unwrap();
        assert!(view.crisis_locked);
        assert_eq!(view.flagged_turns, vec![1]);

        let Json(resolved) = record_intervention(
            State(state.clone()),
            Path("s1".into()),
            Json(InterventionRequest { performed_by: "clinician".into(), note: String::new() }),
        )
        .await
        .unwrap();
        assert_eq!(resolved.risk, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_close_and_list() {
        let state = app_state();
        submit_turn(State(state.clone()), Path("s1".into()), turn("hello")).await.unwrap();
        close_session(State(state.clone()), Path("s1".into())).await.unwrap();

        let err = close_session(State(state.clone()), Path("s1".into())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let Json(listed) = list_sessions(State(state)).await.unwrap();
        assert_eq!(listed.sessions.len(), 1);
        assert_eq!(listed.sessions[0].turn_count, 1);
    }
}
