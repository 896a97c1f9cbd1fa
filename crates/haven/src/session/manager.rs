use super::actor::{SessionActor, SessionHandle};
use super::{Session, SessionView};
use crate::clinical::{InterventionEvent, RiskLevel};
use crate::error::SessionError;
use crate::pipeline::{TurnOutcome, TurnPipeline};
use crate::store::SessionStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

/// Pending reply for a submitted turn.
///
/// Dropping the ticket before the outcome arrives cancels the turn; the
/// clinical and memory updates it already made still commit.
pub struct TurnTicket {
    receiver: oneshot::Receiver<TurnOutcome>,
    guard: DropGuard,
    cancel: CancellationToken,
}

impl TurnTicket {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn outcome(self) -> Result<TurnOutcome, SessionError> {
        let TurnTicket { receiver, guard, .. } = self;
        let outcome = receiver.await.map_err(|_| SessionError::Cancelled);
        guard.disarm();
        outcome
    }
}

/// Routes requests to per-session actors, starting or resuming them on
/// first use.
///
/// Lookups, spawns and closes for one session id are serialised by a
/// per-id lifecycle lock, so a request can never reach a second actor while
/// the first is still writing its final state.
pub struct SessionManager {
    sessions: DashMap<String, SessionHandle>,
    lifecycle: DashMap<String, Arc<Mutex<()>>>,
    pipeline: Arc<TurnPipeline>,
    store: Arc<dyn SessionStore>,
    recent_window: usize,
    persist_every: u32,
}

impl SessionManager {
    pub fn new(
        pipeline: Arc<TurnPipeline>,
        store: Arc<dyn SessionStore>,
        recent_window: usize,
        persist_every: u32,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            lifecycle: DashMap::new(),
            pipeline,
            store,
            recent_window,
            persist_every,
        }
    }

    /// Queues a turn. Awaiting this only waits for the turn to be queued;
    /// the reply comes from [`TurnTicket::outcome`].
    pub async fn submit(&self, session_id: &str, text: impl Into<String>) -> Result<TurnTicket, SessionError> {
        let (_guard, handle) = self.handle(session_id).await?;
        let cancel = CancellationToken::new();
        let receiver = handle.submit(text, cancel.clone())?;
        Ok(TurnTicket {
            receiver,
            guard: cancel.clone().drop_guard(),
            cancel,
        })
    }

    pub async fn view(&self, session_id: &str) -> Result<SessionView, SessionError> {
        let (_guard, handle) = self.handle(session_id).await?;
        handle.view().await
    }

    pub async fn export(&self, session_id: &str) -> Result<Session, SessionError> {
        let (_guard, handle) = self.handle(session_id).await?;
        handle.export().await
    }

    pub async fn resolve_crisis(
        &self,
        session_id: &str,
        event: InterventionEvent,
    ) -> Result<RiskLevel, SessionError> {
        let (_guard, handle) = self.handle(session_id).await?;
        handle.resolve_crisis(event).await
    }

    /// Persists and stops the session's actor. Returns false when the
    /// session was not running.
    pub async fn close(&self, session_id: &str) -> Result<bool, SessionError> {
        let _guard = self.lifecycle_lock(session_id).lock_owned().await;
        let Some(handle) = self.sessions.get(session_id).map(|h| h.clone()) else {
            return Ok(false);
        };

        let result = handle.close().await;
        self.sessions.remove(session_id);
        result?;
        info!("Session {} closed", session_id);
        Ok(true)
    }

    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.close(&id).await {
                warn!("Failed to close session {} on shutdown: {}", id, e);
            }
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn lifecycle_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.lifecycle.entry(session_id.to_string()).or_default().clone()
    }

    /// Running handle for the session, spawned from the store if needed.
    /// The returned guard must be held until the command has been sent.
    async fn handle(&self, session_id: &str) -> Result<(OwnedMutexGuard<()>, SessionHandle), SessionError> {
        let guard = self.lifecycle_lock(session_id).lock_owned().await;

        if let Some(handle) = self.sessions.get(session_id).map(|h| h.clone()) {
            if !handle.is_closed() {
                return Ok((guard, handle));
            }
        }

        let session = match self.store.load(session_id).await? {
            Some(session) => {
                info!("Resuming session {} with {} turns", session_id, session.turns.len());
                session
            }
            None => Session::new(session_id, self.recent_window),
        };

        let handle = SessionActor::spawn(session, self.pipeline.clone(), self.store.clone(), self.persist_every);
        self.sessions.insert(session_id.to_string(), handle.clone());
        Ok((guard, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::SymptomCategory;
    use crate::pipeline::PipelineSettings;
    use crate::session::Disposition;
    use crate::store::InMemorySessionStore;
    use crate::testing::{CollectingTraceSink, StubGenerator, StubRetriever};
    use chrono::Utc;
    use std::time::Duration;

    fn manager_with(generator: StubGenerator, store: Arc<dyn SessionStore>, persist_every: u32) -> SessionManager {
        let pipeline = TurnPipeline::new(
            Arc::new(generator),
            Arc::new(StubRetriever::empty()),
            Arc::new(CollectingTraceSink::default()),
            PipelineSettings {
                generation_timeout: Duration::from_secs(1),
                tool_timeout: Duration::from_millis(200),
            },
        );
        SessionManager::new(Arc::new(pipeline), store, 8, persist_every)
    }

    fn manager() -> SessionManager {
        manager_with(StubGenerator::always("I'm listening."), Arc::new(InMemorySessionStore::new()), 1)
    }

    // ===== Ordering =====

    #[tokio::test]
    async fn test_concurrent_submissions_apply_in_order() {
        let manager = manager();
        let messages: Vec<String> = (0..12)
            .map(|i| if i % 2 == 0 { format!("I feel sad {}", i) } else { format!("can't sleep {}", i) })
            .collect();

        let mut tickets: Vec<TurnTicket> = Vec::new();
        for m in &messages {
            tickets.push(manager.submit("s1", m.clone()).await.unwrap());
        }
        let outcomes = futures::future::join_all(tickets.into_iter().map(|t| t.outcome())).await;

        for (i, outcome) in outcomes.into_iter().enumerate() {
            assert_eq!(outcome.unwrap().turn_index, i as u64 + 1);
        }

        let session = manager.export("s1").await.unwrap();
        let texts: Vec<&str> = session.turns.iter().map(|t| t.user_text.as_str()).collect();
        assert_eq!(texts, messages.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(session.clinical.tallies[&SymptomCategory::DepressedMood].indicator_count, 6);
        assert_eq!(session.clinical.tallies[&SymptomCategory::Sleep].indicator_count, 6);
        assert_eq!(session.memory.summaries().len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let manager = manager();
        manager.submit("a", "I want to kill myself").await.unwrap().outcome().await.unwrap();
        manager.submit("b", "hello").await.unwrap().outcome().await.unwrap();

        assert_eq!(manager.view("a").await.unwrap().risk, RiskLevel::High);
        assert_eq!(manager.view("b").await.unwrap().risk, RiskLevel::Low);
        assert_eq!(manager.active_sessions(), 2);
    }

    // ===== Crisis lifecycle =====

    #[tokio::test]
    async fn test_intervention_lifts_crisis_lock() {
        let manager = manager();
        let outcome = manager.submit("s1", "I want to end it all").await.unwrap().outcome().await.unwrap();
        assert_eq!(outcome.disposition, Disposition::Blocked);
        assert!(manager.view("s1").await.unwrap().crisis_locked);

        let risk = manager
            .resolve_crisis(
                "s1",
                InterventionEvent {
                    performed_by: "on-call clinician".into(),
                    note: "safety plan agreed".into(),
                    recorded_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(risk, RiskLevel::Low);
        assert!(!manager.view("s1").await.unwrap().crisis_locked);
    }

    // ===== Cancellation =====

    #[tokio::test]
    async fn test_dropped_ticket_cancels_but_commits() {
        let manager = manager_with(
            StubGenerator::always("slow").with_delay(Duration::from_secs(5)),
            Arc::new(InMemorySessionStore::new()),
            1,
        );
        let ticket = manager.submit("s1", "I feel sad and tired").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(ticket);

        let session = manager.export("s1").await.unwrap();
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].disposition, Disposition::Cancelled);
        assert!(session.clinical.total_score() > 0.0);
        assert_eq!(session.memory.turn_count(), 1);
    }

    // ===== Persistence =====

    #[tokio::test]
    async fn test_close_persists_and_resume_restores() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let manager = manager_with(StubGenerator::always("I'm here."), store.clone(), 100);

        for text in ["I feel sad", "still sad today", "a bit anxious too"] {
            manager.submit("s1", text).await.unwrap().outcome().await.unwrap();
        }
        assert!(store.load("s1").await.unwrap().is_none());
        assert!(manager.close("s1").await.unwrap());
        assert!(!manager.close("s1").await.unwrap());

        let saved = store.load("s1").await.unwrap().unwrap();
        assert_eq!(saved.turns.len(), 3);

        let outcome = manager.submit("s1", "hello again").await.unwrap().outcome().await.unwrap();
        assert_eq!(outcome.turn_index, 4);
        let view = manager.view("s1").await.unwrap();
        assert_eq!(view.turn_count, 4);
    }

    #[tokio::test]
    async fn test_submit_during_close_resumes_saved_state() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let manager = manager_with(
            StubGenerator::always("I'm here.").with_delay(Duration::from_millis(150)),
            store.clone(),
            100,
        );

        let first = manager.submit("s1", "first").await.unwrap();
        let (closed, second) = tokio::join!(manager.close("s1"), manager.submit("s1", "second"));
        assert!(closed.unwrap());

        assert_eq!(first.outcome().await.unwrap().turn_index, 1);
        assert_eq!(second.unwrap().outcome().await.unwrap().turn_index, 2);

        let session = manager.export("s1").await.unwrap();
        let texts: Vec<&str> = session.turns.iter().map(|t| t.user_text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(manager.active_sessions(), 1);
    }
}
