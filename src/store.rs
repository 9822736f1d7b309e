//! Entry store: embedded fragments with metadata, incremental upsert and
//! similarity query over both corpora
//!
//! Readers are never blocked across I/O: the write lock is held only for the
//! map mutation itself, and snapshot persistence works from a clone. A reader
//! concurrent with an upsert sees either the pre- or post-upsert entry, never
//! a torn one.

use crate::error::WaypointError;
use crate::types::{Corpus, Entry, QueryFilters};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default, Serialize, Deserialize)]
struct StoreState {
    code: HashMap<String, Entry>,
    docs: HashMap<String, Entry>,
    last_built: Option<i64>,
}

impl StoreState {
    fn corpus(&self, corpus: Corpus) -> &HashMap<String, Entry> {
        match corpus {
            Corpus::Code => &self.code,
            Corpus::Document => &self.docs,
        }
    }

    fn corpus_mut(&mut self, corpus: Corpus) -> &mut HashMap<String, Entry> {
        match corpus {
            Corpus::Code => &mut self.code,
            Corpus::Document => &mut self.docs,
        }
    }
}

/// Persisted, concurrently readable index of embedded entries.
pub struct EntryStore {
    inner: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
}

impl EntryStore {
    /// Volatile store, used by tests and mock mode.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a JSON snapshot file. A missing file starts
    /// empty; an unreadable or unparsable one is surfaced as
    /// StoreUnavailable rather than an empty result set.
    pub fn open(snapshot_path: impl AsRef<Path>) -> Result<Self, WaypointError> {
        let path = snapshot_path.as_ref().to_path_buf();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                WaypointError::StoreUnavailable(format!(
                    "corrupt snapshot {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => {
                return Err(WaypointError::StoreUnavailable(format!(
                    "cannot read snapshot {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        info!(
            "Entry store opened: {} code entries, {} doc entries",
            state.code.len(),
            state.docs.len()
        );

        Ok(Self {
            inner: RwLock::new(state),
            snapshot_path: Some(path),
        })
    }

    /// Upsert entries, deduplicating by id. Entries whose content hash is
    /// unchanged are skipped, so re-running an identical pass writes nothing.
    pub async fn upsert(&self, entries: Vec<Entry>) -> Result<usize, WaypointError> {
        let mut written = 0;
        {
            let mut state = self.inner.write().await;
            for entry in entries {
                let map = state.corpus_mut(entry.corpus);
                let changed = map
                    .get(&entry.id)
                    .map(|existing| existing.metadata.content_hash != entry.metadata.content_hash)
                    .unwrap_or(true);
                if changed {
                    map.insert(entry.id.clone(), entry);
                    written += 1;
                }
            }
        }
        if written > 0 {
            self.persist().await?;
        }
        debug!("Upsert complete: {} entries written", written);
        Ok(written)
    }

    /// True when the stored entry is absent or carries a different hash.
    pub async fn needs_update(&self, corpus: Corpus, id: &str, content_hash: &str) -> bool {
        let state = self.inner.read().await;
        state
            .corpus(corpus)
            .get(id)
            .map(|e| e.metadata.content_hash != content_hash)
            .unwrap_or(true)
    }

    /// Nearest entries to the query vector, ascending by cosine distance.
    /// Ties break by priority (higher first) then path, for determinism.
    pub async fn query(
        &self,
        corpus: Corpus,
        vector: &[f32],
        k: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<(Entry, f32)>, WaypointError> {
        let state = self.inner.read().await;
        let mut scored: Vec<(Entry, f32)> = state
            .corpus(corpus)
            .values()
            .filter(|e| match filters.entry_type {
                Some(t) => e.metadata.entry_type == t,
                None => true,
            })
            .map(|e| (e.clone(), cosine_distance(vector, &e.embedding)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| b.0.metadata.priority.cmp(&a.0.metadata.priority))
                .then_with(|| a.0.metadata.path.cmp(&b.0.metadata.path))
        });
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn delete(&self, ids: &[String]) -> Result<usize, WaypointError> {
        let mut removed = 0;
        {
            let mut state = self.inner.write().await;
            for id in ids {
                if state.code.remove(id).is_some() || state.docs.remove(id).is_some() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn set_last_built(&self, timestamp: i64) -> Result<(), WaypointError> {
        self.inner.write().await.last_built = Some(timestamp);
        self.persist().await
    }

    pub async fn last_built(&self) -> Option<i64> {
        self.inner.read().await.last_built
    }

    pub async fn count(&self, corpus: Corpus) -> usize {
        self.inner.read().await.corpus(corpus).len()
    }

    /// Serialize outside the lock so concurrent readers proceed during I/O.
    async fn persist(&self) -> Result<(), WaypointError> {
        let Some(ref path) = self.snapshot_path else {
            return Ok(());
        };
        let bytes = {
            let state = self.inner.read().await;
            serde_json::to_vec(&*state).map_err(|e| {
                WaypointError::StoreUnavailable(format!("snapshot encode failed: {}", e))
            })?
        };
        std::fs::write(path, bytes).map_err(|e| {
            WaypointError::StoreUnavailable(format!(
                "cannot write snapshot {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Cosine distance for unit-normalized vectors: 1 - dot, in [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    1.0 - dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryMetadata, EntryType};

    fn entry(id: &str, corpus: Corpus, embedding: Vec<f32>, hash: &str) -> Entry {
        Entry {
            id: id.to_string(),
            corpus,
            text: format!("text of {}", id),
            embedding,
            metadata: EntryMetadata {
                path: format!("{}.md", id),
                entry_type: EntryType::Other,
                priority: 5,
                module_owner: None,
                last_modified: 0,
                content_hash: hash.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_hash() {
        let store = EntryStore::in_memory();
        let e = entry("a", Corpus::Code, vec![1.0, 0.0], "h1");

        let first = store.upsert(vec![e.clone()]).await.unwrap();
        assert_eq!(first, 1);

        let second = store.upsert(vec![e]).await.unwrap();
        assert_eq!(second, 0, "unchanged content must not be rewritten");
        assert_eq!(store.count(Corpus::Code).await, 1);
    }

    #[tokio::test]
    async fn query_orders_by_distance() {
        let store = EntryStore::in_memory();
        store
            .upsert(vec![
                entry("near", Corpus::Document, vec![1.0, 0.0], "h1"),
                entry("far", Corpus::Document, vec![0.0, 1.0], "h2"),
            ])
            .await
            .unwrap();

        let hits = store
            .query(Corpus::Document, &[1.0, 0.0], 2, &QueryFilters::default())
            .await
            .unwrap();
        assert_eq!(hits[0].0.id, "near");
        assert!(hits[0].1 < hits[1].1);
    }

    #[tokio::test]
    async fn delete_removes_entries_across_corpora() {
        let store = EntryStore::in_memory();
        store
            .upsert(vec![
                entry("a", Corpus::Code, vec![1.0], "h1"),
                entry("b", Corpus::Document, vec![1.0], "h2"),
            ])
            .await
            .unwrap();

        let removed = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Corpus::Code).await, 0);
        assert_eq!(store.count(Corpus::Document).await, 1);
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");

        let store = EntryStore::open(&path).unwrap();
        store
            .upsert(vec![entry("a", Corpus::Code, vec![1.0], "h1")])
            .await
            .unwrap();
        store.set_last_built(42).await.unwrap();

        let reopened = EntryStore::open(&path).unwrap();
        assert_eq!(reopened.count(Corpus::Code).await, 1);
        assert_eq!(reopened.last_built().await, Some(42));
    }

    #[test]
    fn corrupt_snapshot_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = EntryStore::open(&path).unwrap_err();
        assert!(matches!(err, WaypointError::StoreUnavailable(_)));
    }
}
