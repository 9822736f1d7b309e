//! Semantic search across the code and documentation corpora
//!
//! Read-only: embeds the query once, asks the store for nearest entries per
//! corpus, converts distance to a bounded similarity and orders results
//! deterministically. A stale index degrades to a flag, never a failure.

use crate::embedding::Embedder;
use crate::error::WaypointError;
use crate::indexer::now_secs;
use crate::store::EntryStore;
use crate::types::{Corpus, Query, ScoredEntry, SearchResults};
use std::sync::Arc;
use tracing::{debug, info};

pub struct SemanticSearchEngine {
    store: Arc<EntryStore>,
    embedder: Arc<Embedder>,
    staleness_window_secs: i64,
}

impl SemanticSearchEngine {
    pub fn new(store: Arc<EntryStore>, embedder: Arc<Embedder>, staleness_window_secs: i64) -> Self {
        Self {
            store,
            embedder,
            staleness_window_secs,
        }
    }

    pub async fn search(&self, query: &Query) -> Result<SearchResults, WaypointError> {
        let vector = self.embedder.embed(&query.text).await?;

        let code_hits = if query.filters.corpus != Some(Corpus::Document) {
            self.corpus_hits(Corpus::Code, &vector, query).await?
        } else {
            Vec::new()
        };
        let doc_hits = if query.filters.corpus != Some(Corpus::Code) {
            self.corpus_hits(Corpus::Document, &vector, query).await?
        } else {
            Vec::new()
        };

        let stale = self.is_stale().await;
        if stale {
            debug!("Index is older than the staleness window; results are best-effort");
        }

        info!(
            "Search complete: {} code hits, {} doc hits, stale={}",
            code_hits.len(),
            doc_hits.len(),
            stale
        );

        Ok(SearchResults {
            code_hits,
            doc_hits,
            stale,
        })
    }

    async fn corpus_hits(
        &self,
        corpus: Corpus,
        vector: &[f32],
        query: &Query,
    ) -> Result<Vec<ScoredEntry>, WaypointError> {
        let raw = self
            .store
            .query(corpus, vector, query.limit, &query.filters)
            .await?;

        let mut hits: Vec<ScoredEntry> = raw
            .into_iter()
            .map(|(entry, distance)| ScoredEntry {
                entry,
                similarity: similarity_from_distance(distance),
            })
            .collect();

        // Store order is distance-ascending already; re-sort on the bounded
        // similarity with the same deterministic tie-breaks.
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.entry.metadata.priority.cmp(&a.entry.metadata.priority))
                .then_with(|| a.entry.metadata.path.cmp(&b.entry.metadata.path))
        });
        Ok(hits)
    }

    async fn is_stale(&self) -> bool {
        match self.store.last_built().await {
            Some(built) => now_secs() - built > self.staleness_window_secs,
            None => true, // never indexed
        }
    }
}

/// Cosine distance in [0, 2] mapped to similarity in [0, 1].
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_bounded() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(2.0), 0.0);
        assert_eq!(similarity_from_distance(5.0), 0.0);
        assert_eq!(similarity_from_distance(-1.0), 1.0);
        assert!((similarity_from_distance(1.0) - 0.5).abs() < 1e-6);
    }
}
