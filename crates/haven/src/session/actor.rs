//! Single-writer owner of one session.
//!
//! Commands arrive on an unbounded queue and are handled one at a time, so
//! turns submitted for the same session are applied in submission order.

use super::{Session, SessionView};
use crate::clinical::{InterventionEvent, RiskLevel};
use crate::error::SessionError;
use crate::metrics;
use crate::pipeline::{TurnOutcome, TurnPipeline};
use crate::store::SessionStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub(crate) enum SessionCommand {
    Turn {
        text: String,
        cancel: CancellationToken,
        reply: oneshot::Sender<TurnOutcome>,
    },
    View {
        reply: oneshot::Sender<SessionView>,
    },
    ResolveCrisis {
        event: InterventionEvent,
        reply: oneshot::Sender<RiskLevel>,
    },
    Export {
        reply: oneshot::Sender<Session>,
    },
    Close {
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
}

pub struct SessionActor {
    session: Session,
    pipeline: Arc<TurnPipeline>,
    store: Arc<dyn SessionStore>,
    persist_every: u32,
    receiver: mpsc::UnboundedReceiver<SessionCommand>,
}

impl SessionActor {
    /// Starts the actor task and returns the only way to reach it.
    pub fn spawn(
        session: Session,
        pipeline: Arc<TurnPipeline>,
        store: Arc<dyn SessionStore>,
        persist_every: u32,
    ) -> SessionHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = session.id.clone();
        let actor = Self {
            session,
            pipeline,
            store,
            persist_every: persist_every.max(1),
            receiver,
        };
        tokio::spawn(actor.run());
        metrics::inc_sessions();
        info!("Session actor started: {}", id);
        SessionHandle { id, sender }
    }

    async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            match command {
                SessionCommand::Turn { text, cancel, reply } => {
                    let outcome = self.pipeline.process(&mut self.session, &text, &cancel).await;
                    if self.session.turns.len() % self.persist_every as usize == 0 {
                        self.persist().await;
                    }
                    if reply.send(outcome).is_err() {
                        debug!("Caller for session {} went away before the reply", self.session.id);
                    }
                }
                SessionCommand::View { reply } => {
                    let _ = reply.send(self.session.view());
                }
                SessionCommand::ResolveCrisis { event, reply } => {
                    let risk = self.session.clinical.resolve_crisis(event).risk;
                    self.persist().await;
                    let _ = reply.send(risk);
                }
                SessionCommand::Export { reply } => {
                    let _ = reply.send(self.session.clone());
                }
                SessionCommand::Close { reply } => {
                    let result = self.store.save(&self.session).await;
                    let _ = reply.send(result);
                    break;
                }
            }
        }

        metrics::dec_sessions();
        info!("Session actor stopped: {}", self.session.id);
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.session).await {
            error!("Failed to persist session {}: {}", self.session.id, e);
        }
    }
}

/// Cloneable address of a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    sender: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queues a turn. The order of `submit` calls is the order of processing.
    pub fn submit(
        &self,
        text: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<TurnOutcome>, SessionError> {
        let (reply, receiver) = oneshot::channel();
        self.send(SessionCommand::Turn { text: text.into(), cancel, reply })?;
        Ok(receiver)
    }

    pub async fn view(&self) -> Result<SessionView, SessionError> {
        let (reply, receiver) = oneshot::channel();
        self.send(SessionCommand::View { reply })?;
        receiver.await.map_err(|_| self.closed())
    }

    pub async fn resolve_crisis(&self, event: InterventionEvent) -> Result<RiskLevel, SessionError> {
        let (reply, receiver) = oneshot::channel();
        self.send(SessionCommand::ResolveCrisis { event, reply })?;
        receiver.await.map_err(|_| self.closed())
    }

    /// Copy of the full session state after every queued command has run.
    pub async fn export(&self) -> Result<Session, SessionError> {
        let (reply, receiver) = oneshot::channel();
        self.send(SessionCommand::Export { reply })?;
        receiver.await.map_err(|_| self.closed())
    }

    /// Persists the session and stops the actor once queued turns finish.
    pub async fn close(&self) -> Result<(), SessionError> {
        let (reply, receiver) = oneshot::channel();
        self.send(SessionCommand::Close { reply })?;
        receiver.await.map_err(|_| self.closed())??;
        Ok(())
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.sender.send(command).map_err(|_| self.closed())
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed(self.id.clone())
    }
}
