use super::{analytic, KnowledgeTool, ToolContext, ToolKind, ToolPayload};
use crate::error::ToolError;
use crate::knowledge::{Collection, Retriever};
use crate::llm::Generator;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A runnable tool. One variant per [`ToolKind`].
pub enum Tool {
    EmotionDecomposition,
    PolarityScoring,
    PatternDetection,
    SymptomScreening,
    TherapyKnowledge(KnowledgeTool),
    ResourceKnowledge(KnowledgeTool),
    MemoryRead,
    MemoryWrite,
    InterventionSelection,
}

impl Tool {
    pub fn kind(&self) -> ToolKind {
        match self {
            Tool::EmotionDecomposition => ToolKind::EmotionDecomposition,
            Tool::PolarityScoring => ToolKind::PolarityScoring,
            Tool::PatternDetection => ToolKind::PatternDetection,
            Tool::SymptomScreening => ToolKind::SymptomScreening,
            Tool::TherapyKnowledge(_) => ToolKind::TherapyKnowledge,
            Tool::ResourceKnowledge(_) => ToolKind::ResourceKnowledge,
            Tool::MemoryRead => ToolKind::MemoryRead,
            Tool::MemoryWrite => ToolKind::MemoryWrite,
            Tool::InterventionSelection => ToolKind::InterventionSelection,
        }
    }

    pub async fn run(&self, ctx: &ToolContext) -> Result<ToolPayload, ToolError> {
        match self {
            Tool::EmotionDecomposition => Ok(analytic::emotion_decomposition(ctx)),
            Tool::PolarityScoring => Ok(analytic::polarity_scoring(ctx)),
            Tool::PatternDetection => Ok(analytic::pattern_detection(ctx)),
            Tool::SymptomScreening => Ok(analytic::symptom_screening(ctx)),
            Tool::TherapyKnowledge(tool) | Tool::ResourceKnowledge(tool) => tool.run(ctx).await,
            Tool::MemoryRead => Ok(analytic::memory_read(ctx)),
            Tool::MemoryWrite => Ok(analytic::memory_write(ctx)),
            Tool::InterventionSelection => Ok(analytic::intervention_selection(ctx)),
        }
    }
}

/// Tools available to plans, keyed by kind.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tool, with knowledge tools backed by the given collaborators.
    pub fn standard(
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn Retriever>,
        timeout: Duration,
    ) -> Self {
        let knowledge = |collection| {
            KnowledgeTool::new(collection, generator.clone(), retriever.clone(), timeout)
        };
        let registry = Self::new()
            .with(Tool::EmotionDecomposition)
            .with(Tool::PolarityScoring)
            .with(Tool::PatternDetection)
            .with(Tool::SymptomScreening)
            .with(Tool::TherapyKnowledge(knowledge(Collection::Therapy)))
            .with(Tool::ResourceKnowledge(knowledge(Collection::Resource)))
            .with(Tool::MemoryRead)
            .with(Tool::MemoryWrite)
            .with(Tool::InterventionSelection);
        info!("Tool registry ready with {} tools", registry.tools.len());
        registry
    }

    pub fn with(mut self, tool: Tool) -> Self {
        self.tools.insert(tool.kind(), tool);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<&Tool> {
        self.tools.get(&kind)
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn available(&self) -> Vec<ToolKind> {
        self.tools.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubGenerator, StubRetriever};

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = ToolRegistry::standard(
            Arc::new(StubGenerator::always("x")),
            Arc::new(StubRetriever::empty()),
            Duration::from_secs(1),
        );
        assert_eq!(registry.available(), ToolKind::ALL.to_vec());
        for kind in ToolKind::ALL {
            assert_eq!(registry.get(kind).map(Tool::kind), Some(kind));
        }
    }

    #[test]
    fn test_partial_registry() {
        let registry = ToolRegistry::new().with(Tool::PolarityScoring);
        assert!(registry.contains(ToolKind::PolarityScoring));
        assert!(!registry.contains(ToolKind::TherapyKnowledge));
        assert!(registry.get(ToolKind::MemoryRead).is_none());
    }
}
