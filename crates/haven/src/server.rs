//! HTTP server wiring: builds the shared pipeline and session manager from
//! [`Config`] and serves the session API.

use crate::api::{self, AppState};
use crate::config::Config;
use crate::knowledge::KnowledgeBase;
use crate::llm::{Generator, HttpGenerator, TracedGenerator};
use crate::pipeline::{PipelineSettings, TurnPipeline};
use crate::session::SessionManager;
use crate::store::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use crate::trace::{JsonlTraceSink, NoopTraceSink, TraceSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a running instance shares between requests.
pub struct Runtime {
    pub manager: Arc<SessionManager>,
    pub store: Arc<dyn SessionStore>,
}

impl Runtime {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let trace: Arc<dyn TraceSink> = if cfg.tracing_enabled {
            Arc::new(JsonlTraceSink::spawn(cfg.trace_dir.clone()))
        } else {
            Arc::new(NoopTraceSink)
        };

        let http: Arc<dyn Generator> = Arc::new(HttpGenerator::from_config(cfg));
        let generator: Arc<dyn Generator> = Arc::new(TracedGenerator::new(http, trace.clone()));

        let knowledge = match KnowledgeBase::load(&cfg.knowledge_dir) {
            Ok(kb) => kb,
            Err(e) => {
                warn!("Failed to load knowledge base: {}. Knowledge tools will return nothing.", e);
                KnowledgeBase::default()
            }
        };

        let store: Arc<dyn SessionStore> = match SqliteSessionStore::new(&cfg.database_path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("Failed to open session database: {}. Falling back to in-memory sessions.", e);
                Arc::new(InMemorySessionStore::new())
            }
        };

        let pipeline = TurnPipeline::new(
            generator,
            Arc::new(knowledge),
            trace,
            PipelineSettings::from_config(cfg),
        );
        let manager = SessionManager::new(
            Arc::new(pipeline),
            store.clone(),
            cfg.recent_window,
            cfg.persist_every,
        );

        Ok(Self { manager: Arc::new(manager), store })
    }
}

pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    cfg.print_config();
    let runtime = Runtime::from_config(&cfg)?;
    let manager = runtime.manager.clone();

    let addr = cfg.api_addr()?;
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = build_router(AppState::new(runtime.manager, runtime.store));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down; persisting open sessions");
    manager.shutdown().await;
    Ok(())
}

pub fn build_router(state: AppState) -> axum::Router {
    use axum::{
        routing::{get, post},
        Router,
    };
    use tower_http::{
        cors::{Any, CorsLayer},
        limit::RequestBodyLimitLayer,
        timeout::TimeoutLayer,
        trace::TraceLayer,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/sessions", get(api::list_sessions))
        .route("/sessions/:id/turns", post(api::submit_turn))
        .route("/sessions/:id/state", get(api::get_state))
        .route("/sessions/:id/interventions", post(api::record_intervention))
        .route("/sessions/:id/close", post(api::close_session))
        .route("/metrics", get(api::metrics_text))
        .route("/healthz", get(api::healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}
