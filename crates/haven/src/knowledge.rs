//! Retrieval capability and a local TF-IDF knowledge base.
//!
//! Collections are loaded from `<dir>/<collection>_knowledge.json`, each a
//! JSON array of `{ "title": ..., "content": ... }` documents. A missing file
//! is an empty collection, not an error.

use crate::error::RetrievalError;
use crate::utils::TextUtils;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Documents scoring below this are not returned.
const MIN_RELEVANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Therapy,
    Resource,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Therapy, Collection::Resource];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Therapy => "therapy",
            Collection::Resource => "resource",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub title: String,
    pub text: String,
    pub relevance: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `top_k` documents ordered by descending relevance. No match is
    /// an empty vector.
    async fn search(
        &self,
        query: &str,
        collection: Collection,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

#[derive(Debug, Clone, Deserialize)]
struct SourceDocument {
    title: String,
    content: String,
}

#[derive(Debug, Default)]
struct Index {
    documents: Vec<SourceDocument>,
    vectors: Vec<HashMap<String, f64>>,
    idf: HashMap<String, f64>,
}

impl Index {
    fn build(documents: Vec<SourceDocument>) -> Self {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|d| tokenize(&format!("{} {}", d.title, d.content)))
            .collect();

        let n = tokenized.len() as f64;
        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&String> = tokens.iter().collect();
            seen.sort();
            seen.dedup();
            for t in seen {
                *df.entry(t.clone()).or_default() += 1;
            }
        }
        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(t, count)| (t, ((n + 1.0) / (count as f64 + 1.0)).ln() + 1.0))
            .collect();

        let vectors = tokenized.iter().map(|tokens| weigh(tokens, &idf)).collect();

        Self { documents, vectors, idf }
    }

    fn search(&self, query: &str, top_k: usize) -> Vec<RetrievedDocument> {
        let query_vec = weigh(&tokenize(query), &self.idf);
        if query_vec.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine(&query_vec, v)))
            .filter(|(_, score)| *score >= MIN_RELEVANCE)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(top_k)
            .map(|(i, relevance)| RetrievedDocument {
                title: self.documents[i].title.clone(),
                text: self.documents[i].content.clone(),
                relevance,
            })
            .collect()
    }
}

/// In-process retriever over small curated collections.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    indexes: HashMap<Collection, Index>,
}

impl KnowledgeBase {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut kb = Self::default();
        for collection in Collection::ALL {
            let path = dir.join(format!("{}_knowledge.json", collection.as_str()));
            if !path.exists() {
                warn!("No {} knowledge at {}; collection is empty", collection.as_str(), path.display());
                continue;
            }
            let raw = std::fs::read_to_string(&path)?;
            let documents: Vec<SourceDocument> = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid knowledge file {}: {}", path.display(), e))?;
            info!("Loaded {} {} documents", documents.len(), collection.as_str());
            kb.indexes.insert(collection, Index::build(documents));
        }
        Ok(kb)
    }

    pub fn from_documents(collection: Collection, documents: Vec<(String, String)>) -> Self {
        let mut kb = Self::default();
        kb.insert(collection, documents);
        kb
    }

    pub fn insert(&mut self, collection: Collection, documents: Vec<(String, String)>) {
        let documents = documents
            .into_iter()
            .map(|(title, content)| SourceDocument { title, content })
            .collect();
        self.indexes.insert(collection, Index::build(documents));
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.indexes.get(&collection).map_or(0, |i| i.documents.len())
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn search(
        &self,
        query: &str,
        collection: Collection,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let results = self
            .indexes
            .get(&collection)
            .map(|index| index.search(query, top_k))
            .unwrap_or_default();
        debug!("{} search returned {} documents", collection.as_str(), results.len());
        Ok(results)
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "am", "are", "was", "were", "be", "been", "i", "me", "my", "you", "it", "this", "that", "so",
    "do", "have", "has", "had", "not", "feel", "feeling", "can", "could", "get", "just",
    "really", "what", "how", "your", "they", "them",
];

fn tokenize(text: &str) -> Vec<String> {
    let folded = TextUtils::fold(text);
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn weigh(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut tf: HashMap<String, f64> = HashMap::new();
    for t in tokens {
        if idf.contains_key(t) {
            *tf.entry(t.clone()).or_default() += 1.0;
        }
    }
    let total = tokens.len().max(1) as f64;
    tf.into_iter()
        .map(|(t, count)| {
            let w = (count / total) * idf[&t];
            (t, w)
        })
        .collect()
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a.iter().filter_map(|(t, w)| b.get(t).map(|v| w * v)).sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|w| w * w).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
