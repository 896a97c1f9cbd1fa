//! Executes the tool steps of a plan.
//!
//! All steps run concurrently, each under its own deadline, and are joined
//! before the call returns, so nothing resolves after synthesis starts.
//! Results come back in plan order. A failing or slow tool only affects its
//! own result.

use super::{ToolContext, ToolKind, ToolRegistry, ToolResult};
use crate::error::ToolError;
use crate::metrics;
use crate::pipeline::ExecutionPlan;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct ToolEngine {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolEngine {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs every tool step. Steps still pending when `cancel` fires are
    /// dropped from the output rather than reported as failures.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &ToolContext,
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        let futures = plan.steps().iter().map(|step| async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Dropping {} after cancellation", step.tool);
                    None
                }
                result = self.run_one(step.tool, ctx) => Some(result),
            }
        });

        let results: Vec<ToolResult> = join_all(futures).await.into_iter().flatten().collect();

        for result in &results {
            let status = if result.success { "ok" } else { "error" };
            metrics::inc_tool_result(result.tool.internal_name(), status);
        }
        results
    }

    async fn run_one(&self, kind: ToolKind, ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let outcome = match self.registry.get(kind) {
            None => Err(ToolError::NotRegistered),
            Some(tool) => tokio::time::timeout(self.timeout, tool.run(ctx))
                .await
                .unwrap_or(Err(ToolError::Timeout(self.timeout))),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(payload) => {
                debug!("{} finished in {}ms", kind, latency_ms);
                ToolResult::ok(kind, payload, latency_ms)
            }
            Err(e) => {
                warn!("{} failed after {}ms: {}", kind, latency_ms, e);
                ToolResult::failed(kind, e.code(), latency_ms)
            }
        }
    }
}
