//! Session persistence.
//!
//! Sessions are read when an actor resumes and written at session end or
//! every `persist_every` turns.

pub mod migration;
pub mod sqlite;

pub use migration::MigrationManager;
pub use sqlite::SqliteSessionStore;

use crate::clinical::RiskLevel;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Listing entry for a stored session; the full record is [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub turn_count: usize,
    pub risk: RiskLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn of(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            turn_count: session.turns.len(),
            risk: session.clinical.risk,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Persistence boundary for sessions. Implementations that block must keep
/// that work off the async executor.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<Session>>;

    /// Writes the whole session. Turns already stored are left untouched.
    async fn save(&self, session: &Session) -> anyhow::Result<()>;

    /// Most recently updated first.
    async fn list(&self) -> anyhow::Result<Vec<SessionRecord>>;
}

/// Process-local store used by tests and by `chat` when no database is wanted.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<SessionRecord>> {
        let mut records: Vec<SessionRecord> = self.sessions.iter().map(|s| SessionRecord::of(&s)).collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}
