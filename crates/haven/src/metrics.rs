use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static TURNS: OnceLock<IntCounterVec> = OnceLock::new();
static HARD_STOPS: OnceLock<IntCounterVec> = OnceLock::new();
static TOOL_RESULTS: OnceLock<IntCounterVec> = OnceLock::new();
static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();
static SYNTHESIS_SECONDS: OnceLock<Histogram> = OnceLock::new();

pub fn init_metrics() {
    let turns = TURNS.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("haven_turns_total", "Processed turns by disposition"),
            &["disposition"],
        )
        .expect("static metric definition")
    });

    let hard_stops = HARD_STOPS.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("haven_hard_stops_total", "Safety gate hard stops by reason"),
            &["reason"],
        )
        .expect("static metric definition")
    });

    let tool_results = TOOL_RESULTS.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("haven_tool_results_total", "Tool invocations by tool and status"),
            &["tool", "status"],
        )
        .expect("static metric definition")
    });

    let active_sessions = ACTIVE_SESSIONS.get_or_init(|| {
        IntGauge::new("haven_active_sessions", "Session actors currently running")
            .expect("static metric definition")
    });

    let synthesis_seconds = SYNTHESIS_SECONDS.get_or_init(|| {
        Histogram::with_opts(prometheus::HistogramOpts::new(
            "haven_synthesis_seconds",
            "Latency of the response synthesis call",
        ))
        .expect("static metric definition")
    });

    REGISTRY.register(Box::new(turns.clone())).ok();
    REGISTRY.register(Box::new(hard_stops.clone())).ok();
    REGISTRY.register(Box::new(tool_results.clone())).ok();
    REGISTRY.register(Box::new(active_sessions.clone())).ok();
    REGISTRY.register(Box::new(synthesis_seconds.clone())).ok();
}

pub fn inc_turn(disposition: &str) {
    if let Some(counter) = TURNS.get() {
        counter.with_label_values(&[disposition]).inc();
    }
}

pub fn inc_hard_stop(reason: &str) {
    if let Some(counter) = HARD_STOPS.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn inc_tool_result(tool: &str, status: &str) {
    if let Some(counter) = TOOL_RESULTS.get() {
        counter.with_label_values(&[tool, status]).inc();
    }
}

pub fn inc_sessions() {
    if let Some(gauge) = ACTIVE_SESSIONS.get() {
        gauge.inc();
    }
}

pub fn dec_sessions() {
    if let Some(gauge) = ACTIVE_SESSIONS.get() {
        gauge.dec();
    }
}

pub fn observe_synthesis(seconds: f64) {
    if let Some(histogram) = SYNTHESIS_SECONDS.get() {
        histogram.observe(seconds);
    }
}

/// Text exposition of every registered metric.
pub fn render() -> anyhow::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}
