//! Safety-gated conversational support pipeline.
//!
//! Every user message passes a deterministic safety gate, updates a
//! longitudinal clinical picture of the session, runs a planned set of
//! analysis and retrieval tools, and is answered by a single synthesis call
//! whose draft is scrubbed before it is returned.

pub mod clinical;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod lexicon;
pub mod llm;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod safety;
pub mod session;
pub mod signals;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod trace;
pub mod utils;

#[cfg(feature = "cli")]
pub mod api;
#[cfg(feature = "cli")]
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use clinical::{ClinicalState, InterventionEvent, MoodSeries, RiskLevel};
pub use config::Config;
pub use error::{GenerationError, RetrievalError, SessionError, ToolError};
pub use llm::{Generator, GenerationRequest};
pub use memory::{ConversationMemory, MemorySummary, Message};
pub use pipeline::{PipelineSettings, TurnOutcome, TurnPipeline};
pub use session::{Disposition, Session, SessionManager, Turn, TurnTicket};
pub use store::{InMemorySessionStore, SessionStore, SqliteSessionStore};
pub use trace::{TraceRecord, TraceSink};
