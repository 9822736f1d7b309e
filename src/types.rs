//! Core type definitions for Waypoint query navigation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which indexed collection an entry belongs to
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    Code,
    Document,
}

/// Fixed taxonomy of indexed document kinds
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    ModuleReadme,
    InterfaceSpec,
    Changelog,
    ProtocolDoc,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub path: String,
    pub entry_type: EntryType,
    pub priority: u8, // 1-10
    pub module_owner: Option<String>,
    pub last_modified: i64, // unix timestamp
    pub content_hash: String, // blake3 hex, drives incremental indexing
}

/// One indexed unit of text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String, // unique within its corpus
    pub corpus: Corpus,
    pub text: String,
    pub embedding: Vec<f32>, // unit-normalized, immutable once computed
    pub metadata: EntryMetadata,
}

/// Optional constraints on a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    pub entry_type: Option<EntryType>,
    pub corpus: Option<Corpus>,
}

/// A navigation request
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub filters: QueryFilters,
    pub limit: usize, // max results per corpus
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filters: QueryFilters::default(),
            limit: 5,
        }
    }
}

/// Entry plus its bounded similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub entry: Entry,
    pub similarity: f32, // [0, 1], higher = more similar
}

/// Per-corpus hits for one query
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub code_hits: Vec<ScoredEntry>,
    pub doc_hits: Vec<ScoredEntry>,
    pub stale: bool,
}

/// Intent categories a query can classify into
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    DocLookup,
    CodeLocation,
    ModuleHealth,
    Research,
    General,
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentCategory::DocLookup => "DOC_LOOKUP",
            IntentCategory::CodeLocation => "CODE_LOCATION",
            IntentCategory::ModuleHealth => "MODULE_HEALTH",
            IntentCategory::Research => "RESEARCH",
            IntentCategory::General => "GENERAL",
        };
        f.write_str(s)
    }
}

/// Classification result: exactly one category per query
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Intent {
    pub category: IntentCategory,
    pub confidence: f32, // [0, 1]
}

/// Static catalog entry for one analysis component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDescriptor {
    pub name: &'static str,
    pub capability_tags: &'static [&'static str],
    pub estimated_cost: u32, // relative token/time weight
}

/// Why a routed candidate was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OverBudget,
    ZeroWeight,
}

/// One routing outcome; excluded candidates are kept for observability
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationDecision {
    pub component_name: String,
    pub relevance_weight: f32,
    pub included: bool,
    pub skip_reason: Option<SkipReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Degraded,
}

/// A deduplicable warning surfaced by a component
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub category: String,
    pub message: String,
    pub count: usize, // raw occurrences collapsed into this alert
    pub examples: Vec<String>, // bounded sample
}

impl Alert {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            count: 1,
            examples: Vec::new(),
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Structured output of one component execution
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub component_name: String,
    pub summary: String,
    pub severity: Severity,
    pub alerts: Vec<Alert>,
    pub references: Vec<String>, // paths/locations
}

/// Caller rating of one answered query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    Good,
    Noisy,
    Missing,
}

impl FeedbackRating {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "good" => Some(Self::Good),
            "noisy" => Some(Self::Noisy),
            "missing" => Some(Self::Missing),
            _ => None,
        }
    }
}

/// Append-only feedback log record; never mutated after write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub query_text: String,
    pub intent_category: IntentCategory,
    pub components_used: Vec<String>,
    pub rating: FeedbackRating,
    pub timestamp: i64,
}

/// Rendered report returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub text: String,
    pub intent: Intent,
    pub degraded: bool,
}

/// Per-query execution statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueryStats {
    pub components_run: usize,
    pub components_skipped: usize,
    pub components_degraded: usize,
    pub cost_spent: u32,
    pub elapsed_ms: u64,
}

/// Full outcome of one answered query
#[derive(Debug, Serialize)]
pub struct QueryOutcome {
    pub report: Report,
    pub decisions: Vec<OrchestrationDecision>,
    pub stats: QueryStats,
}

/// Per-pass indexing statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub scanned: usize,
    pub written: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Count hits per owning module, for cross-reference reporting
pub fn source_distribution(results: &SearchResults) -> HashMap<String, usize> {
    let mut dist = HashMap::new();
    for hit in results.code_hits.iter().chain(results.doc_hits.iter()) {
        let owner = hit
            .entry
            .metadata
            .module_owner
            .clone()
            .unwrap_or_else(|| "unowned".to_string());
        *dist.entry(owner).or_insert(0) += 1;
    }
    dist
}
