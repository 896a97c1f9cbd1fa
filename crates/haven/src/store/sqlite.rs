use super::migration::MigrationManager;
use super::{SessionRecord, SessionStore};
use crate::clinical::{ClinicalState, MoodSeries, RiskLevel};
use crate::memory::ConversationMemory;
use crate::session::{Session, Turn};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// SQLite-backed store. Session state columns are JSON; each turn is its
/// own row and is never rewritten once stored.
pub struct SqliteSessionStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SqliteSessionStore {
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening session database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }

        info!("Session database initialized");
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Single-connection pool; every in-memory connection would otherwise be
    /// a separate database.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Runs synchronous database work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Pool<SqliteConnectionManager>) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || work(&pool))
            .await
            .map_err(|e| anyhow::anyhow!("Session storage task failed: {}", e))?
    }
}

fn get_conn(pool: &Pool<SqliteConnectionManager>) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
    pool.get()
        .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
}

fn parse_time(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Bad timestamp in session database: {}", raw))?
        .with_timezone(&Utc))
}

fn parse_risk(raw: &str) -> RiskLevel {
    match raw {
        "high" => RiskLevel::High,
        "moderate" => RiskLevel::Moderate,
        _ => RiskLevel::Low,
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.blocking(move |pool| load_session(pool, &session_id)).await
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        let session = session.clone();
        self.blocking(move |pool| save_session(pool, &session)).await
    }

    async fn list(&self) -> anyhow::Result<Vec<SessionRecord>> {
        self.blocking(list_sessions).await
    }
}

fn load_session(pool: &Pool<SqliteConnectionManager>, session_id: &str) -> anyhow::Result<Option<Session>> {
    let conn = get_conn(pool)?;

    let row = conn
        .query_row(
            "SELECT clinical, mood, memory, created_at, updated_at FROM sessions WHERE id = ?1",
            [session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((clinical, mood, memory, created_at, updated_at)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT payload FROM turns WHERE session_id = ?1 ORDER BY turn_index ASC",
    )?;
    let turns = stmt
        .query_map([session_id], |row| row.get::<_, String>(0))?
        .map(|payload| -> anyhow::Result<Turn> {
            Ok(serde_json::from_str(&payload?).context("Corrupt turn record")?)
        })
        .collect::<anyhow::Result<Vec<Turn>>>()?;

    debug!("Loaded session {} with {} turns", session_id, turns.len());
    Ok(Some(Session {
        id: session_id.to_string(),
        turns,
        clinical: serde_json::from_str::<ClinicalState>(&clinical).context("Corrupt clinical state")?,
        mood: serde_json::from_str::<MoodSeries>(&mood).context("Corrupt mood series")?,
        memory: serde_json::from_str::<ConversationMemory>(&memory).context("Corrupt memory")?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    }))
}

fn save_session(pool: &Pool<SqliteConnectionManager>, session: &Session) -> anyhow::Result<()> {
    let mut conn = get_conn(pool)?;
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO sessions (id, risk, clinical, mood, memory, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            risk = excluded.risk,
            clinical = excluded.clinical,
            mood = excluded.mood,
            memory = excluded.memory,
            updated_at = excluded.updated_at",
        params![
            session.id,
            session.clinical.risk.as_str(),
            serde_json::to_string(&session.clinical)?,
            serde_json::to_string(&session.mood)?,
            serde_json::to_string(&session.memory)?,
            session.created_at.to_rfc3339(),
            session.updated_at.to_rfc3339(),
        ],
    )?;

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO turns
             (session_id, turn_index, disposition, flagged, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for turn in &session.turns {
            inserted += stmt.execute(params![
                session.id,
                turn.index as i64,
                turn.disposition.as_str(),
                turn.flagged_for_review,
                serde_json::to_string(turn)?,
                turn.timestamp.to_rfc3339(),
            ])?;
        }
    }

    tx.commit()?;
    debug!("Saved session {} ({} new turns)", session.id, inserted);
    Ok(())
}

fn list_sessions(pool: &Pool<SqliteConnectionManager>) -> anyhow::Result<Vec<SessionRecord>> {
    let conn = get_conn(pool)?;
    let mut stmt = conn.prepare(
        "SELECT s.id, s.risk, s.created_at, s.updated_at,
                (SELECT COUNT(*) FROM turns t WHERE t.session_id = s.id)
         FROM sessions s ORDER BY s.updated_at DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, risk, created_at, updated_at, turn_count) = row?;
        records.push(SessionRecord {
            id,
            turn_count: turn_count as usize,
            risk: parse_risk(&risk),
            created_at: parse_time(&created_at)?,
            updated_at: parse_time(&updated_at)?,
        });
    }
    Ok(records)
}
