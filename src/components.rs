//! Analysis components: pure functions over the query and search results
//!
//! Components never mutate shared state. They may read files under the
//! corpus roots for extra context, degrading gracefully when a read fails.

use crate::types::{
    source_distribution, Alert, ComponentDescriptor, EntryType, Finding, Query, SearchResults,
    Severity,
};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

/// Age beyond which a documentation entry counts as stale, in seconds.
const DOC_STALE_AFTER_SECS: i64 = 30 * 24 * 3600;

#[async_trait]
pub trait AnalysisComponent: Send + Sync {
    fn descriptor(&self) -> ComponentDescriptor;

    async fn analyze(&self, query: &Query, results: &SearchResults) -> Result<Finding>;
}

fn finding(
    descriptor: &ComponentDescriptor,
    summary: String,
    severity: Severity,
    alerts: Vec<Alert>,
    references: Vec<String>,
) -> Finding {
    Finding {
        component_name: descriptor.name.to_string(),
        summary,
        severity,
        alerts,
        references,
    }
}

/// Surfaces the best documentation matches. Sole provider of the
/// protocol-lookup capability.
pub struct DocRetriever;

#[async_trait]
impl AnalysisComponent for DocRetriever {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            name: "doc_retriever",
            capability_tags: &["doc-lookup", "protocol-lookup"],
            estimated_cost: 2,
        }
    }

    async fn analyze(&self, _query: &Query, results: &SearchResults) -> Result<Finding> {
        let descriptor = self.descriptor();
        if results.doc_hits.is_empty() {
            return Ok(finding(
                &descriptor,
                "no documentation matched the query".to_string(),
                Severity::Warning,
                vec![Alert::new(
                    "no_doc_matches",
                    "no documentation entries matched; the corpus may not cover this topic",
                )],
                Vec::new(),
            ));
        }

        let references: Vec<String> = results
            .doc_hits
            .iter()
            .map(|h| h.entry.metadata.path.clone())
            .collect();
        let protocol_docs = results
            .doc_hits
            .iter()
            .filter(|h| h.entry.metadata.entry_type == EntryType::ProtocolDoc)
            .count();

        let summary = if protocol_docs > 0 {
            format!(
                "{} documentation matches ({} protocol docs), best: {}",
                references.len(),
                protocol_docs,
                references[0]
            )
        } else {
            format!(
                "{} documentation matches, best: {}",
                references.len(),
                references[0]
            )
        };

        Ok(finding(&descriptor, summary, Severity::Info, Vec::new(), references))
    }
}

/// Locates the code entries closest to the query and pulls a one-line
/// snippet from the best match for context.
pub struct CodeLocator {
    roots: Vec<PathBuf>,
}

impl CodeLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn snippet_for(&self, rel_path: &str) -> Option<String> {
        for root in &self.roots {
            let path = root.join(rel_path);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    return content
                        .lines()
                        .find(|l| !l.trim().is_empty())
                        .map(|l| l.trim().to_string());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        None
    }
}

#[async_trait]
impl AnalysisComponent for CodeLocator {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            name: "code_locator",
            capability_tags: &["code-location"],
            estimated_cost: 2,
        }
    }

    async fn analyze(&self, _query: &Query, results: &SearchResults) -> Result<Finding> {
        let descriptor = self.descriptor();
        if results.code_hits.is_empty() {
            return Ok(finding(
                &descriptor,
                "no code entries matched the query".to_string(),
                Severity::Warning,
                vec![Alert::new(
                    "no_code_matches",
                    "no code entries matched; try different wording or re-index",
                )],
                Vec::new(),
            ));
        }

        let references: Vec<String> = results
            .code_hits
            .iter()
            .map(|h| h.entry.metadata.path.clone())
            .collect();

        let best = &results.code_hits[0];
        let summary = match self.snippet_for(&best.entry.metadata.path) {
            Some(snippet) => format!(
                "best match {} (similarity {:.2}): {}",
                best.entry.metadata.path, best.similarity, snippet
            ),
            None => format!(
                "best match {} (similarity {:.2})",
                best.entry.metadata.path, best.similarity
            ),
        };

        Ok(finding(&descriptor, summary, Severity::Info, Vec::new(), references))
    }
}

/// Flags module documentation that has not been touched within the
/// staleness horizon. Sole provider of the health-scan capability.
pub struct ModuleHealthScanner;

#[async_trait]
impl AnalysisComponent for ModuleHealthScanner {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            name: "module_health",
            capability_tags: &["health-scan"],
            estimated_cost: 3,
        }
    }

    async fn analyze(&self, _query: &Query, results: &SearchResults) -> Result<Finding> {
        let descriptor = self.descriptor();
        let now = crate::indexer::now_secs();

        let mut alerts = Vec::new();
        let mut references = Vec::new();
        for hit in &results.doc_hits {
            references.push(hit.entry.metadata.path.clone());
            let age = now - hit.entry.metadata.last_modified;
            if age > DOC_STALE_AFTER_SECS {
                alerts.push(
                    Alert::new(
                        "stale_doc",
                        format!(
                            "{} not modified for {} days",
                            hit.entry.metadata.path,
                            age / (24 * 3600)
                        ),
                    )
                    .with_example(hit.entry.metadata.path.clone()),
                );
            }
        }

        let severity = if alerts.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        };
        let summary = format!(
            "{} of {} matched docs are stale",
            alerts.len(),
            results.doc_hits.len()
        );

        Ok(finding(&descriptor, summary, severity, alerts, references))
    }
}

/// Compares documentation age against the newest code in the same module:
/// docs older than their module's code are likely out of date.
pub struct DocFreshnessAuditor;

#[async_trait]
impl AnalysisComponent for DocFreshnessAuditor {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            name: "doc_freshness",
            capability_tags: &["freshness-audit"],
            estimated_cost: 2,
        }
    }

    async fn analyze(&self, _query: &Query, results: &SearchResults) -> Result<Finding> {
        let descriptor = self.descriptor();

        let mut alerts = Vec::new();
        let mut references = Vec::new();
        for doc in &results.doc_hits {
            let Some(ref owner) = doc.entry.metadata.module_owner else {
                continue;
            };
            let newest_code = results
                .code_hits
                .iter()
                .filter(|c| c.entry.metadata.module_owner.as_deref() == Some(owner.as_str()))
                .map(|c| c.entry.metadata.last_modified)
                .max();
            if let Some(code_mtime) = newest_code {
                if doc.entry.metadata.last_modified < code_mtime {
                    references.push(doc.entry.metadata.path.clone());
                    alerts.push(
                        Alert::new(
                            "stale_doc",
                            format!(
                                "{} is older than the code it documents in {}",
                                doc.entry.metadata.path, owner
                            ),
                        )
                        .with_example(doc.entry.metadata.path.clone()),
                    );
                }
            }
        }

        let severity = if alerts.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        };
        let summary = format!("{} docs trail their module's code", alerts.len());

        Ok(finding(&descriptor, summary, severity, alerts, references))
    }
}

/// Reports how the hits spread across owning modules.
pub struct ReferenceMapper;

#[async_trait]
impl AnalysisComponent for ReferenceMapper {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            name: "reference_mapper",
            capability_tags: &["cross-reference"],
            estimated_cost: 1,
        }
    }

    async fn analyze(&self, _query: &Query, results: &SearchResults) -> Result<Finding> {
        let descriptor = self.descriptor();
        let dist = source_distribution(results);

        let mut modules: Vec<(String, usize)> = dist.into_iter().collect();
        modules.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let references: Vec<String> = modules.iter().map(|(m, _)| m.clone()).collect();
        let total: usize = results.code_hits.len() + results.doc_hits.len();
        let summary = format!("{} hits across {} modules", total, references.len());

        Ok(finding(&descriptor, summary, Severity::Info, Vec::new(), references))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Corpus, Entry, EntryMetadata, ScoredEntry};

    fn scored(path: &str, corpus: Corpus, owner: Option<&str>, mtime: i64) -> ScoredEntry {
        ScoredEntry {
            entry: Entry {
                id: path.to_string(),
                corpus,
                text: String::new(),
                embedding: vec![],
                metadata: EntryMetadata {
                    path: path.to_string(),
                    entry_type: EntryType::Other,
                    priority: 5,
                    module_owner: owner.map(|s| s.to_string()),
                    last_modified: mtime,
                    content_hash: String::new(),
                },
            },
            similarity: 0.9,
        }
    }

    #[tokio::test]
    async fn freshness_auditor_flags_docs_older_than_code() {
        let results = SearchResults {
            code_hits: vec![scored("a/b.py", Corpus::Code, Some("a"), 2_000)],
            doc_hits: vec![scored("a/README.md", Corpus::Document, Some("a"), 1_000)],
            stale: false,
        };
        let f = DocFreshnessAuditor
            .analyze(&Query::new("x"), &results)
            .await
            .unwrap();
        assert_eq!(f.severity, Severity::Warning);
        assert_eq!(f.alerts.len(), 1);
        assert_eq!(f.alerts[0].category, "stale_doc");
    }

    #[tokio::test]
    async fn doc_retriever_warns_on_empty_results() {
        let f = DocRetriever
            .analyze(&Query::new("x"), &SearchResults::default())
            .await
            .unwrap();
        assert_eq!(f.severity, Severity::Warning);
        assert_eq!(f.alerts[0].category, "no_doc_matches");
    }

    #[tokio::test]
    async fn code_locator_references_code_paths_in_rank_order() {
        let results = SearchResults {
            code_hits: vec![
                scored("a/b.py", Corpus::Code, Some("a"), 0),
                scored("lib/other.rs", Corpus::Code, Some("lib"), 0),
            ],
            doc_hits: vec![],
            stale: false,
        };
        let f = CodeLocator::new(vec![])
            .analyze(&Query::new("x"), &results)
            .await
            .unwrap();
        assert_eq!(f.references, vec!["a/b.py", "lib/other.rs"]);
    }
}
