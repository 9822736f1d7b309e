//! Incremental corpus indexing
//!
//! Walks the configured corpus roots, hashes each candidate unit and upserts
//! only units whose hash changed since the last pass. Re-running against an
//! unchanged tree produces zero writes.

use crate::embedding::Embedder;
use crate::error::WaypointError;
use crate::store::EntryStore;
use crate::types::{Corpus, Entry, EntryMetadata, EntryType, IndexStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MAX_UNIT_CHARS: usize = 8_000;

const CODE_EXTENSIONS: &[&str] = &["rs", "py", "ts", "js", "go", "java", "c", "cpp", "h"];
const DOC_EXTENSIONS: &[&str] = &["md", "txt", "rst", "adoc"];

pub struct Indexer {
    store: Arc<EntryStore>,
    embedder: Arc<Embedder>,
    roots: Vec<PathBuf>,
}

impl Indexer {
    pub fn new(store: Arc<EntryStore>, embedder: Arc<Embedder>, roots: Vec<PathBuf>) -> Self {
        Self {
            store,
            embedder,
            roots,
        }
    }

    /// One incremental pass over all roots. Idempotent: unchanged units are
    /// detected by content hash and skipped before embedding.
    pub async fn run_pass(&self) -> Result<IndexStats, WaypointError> {
        let mut stats = IndexStats::default();
        let mut pending: Vec<PendingUnit> = Vec::new();

        for root in &self.roots {
            for dirent in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !dirent.file_type().is_file() {
                    continue;
                }
                let path = dirent.path();
                let Some(corpus) = corpus_for(path) else {
                    continue;
                };
                stats.scanned += 1;

                let text = match std::fs::read_to_string(path) {
                    Ok(t) => truncate_chars(t, MAX_UNIT_CHARS),
                    Err(e) => {
                        warn!("Skipping unreadable {}: {}", path.display(), e);
                        stats.failed += 1;
                        continue;
                    }
                };

                let rel = relative_path(root, path);
                let content_hash = blake3::hash(text.as_bytes()).to_hex().to_string();
                if self.store.needs_update(corpus, &rel, &content_hash).await {
                    pending.push(PendingUnit {
                        id: rel.clone(),
                        corpus,
                        text,
                        content_hash,
                        path: rel,
                        last_modified: file_mtime(path),
                    });
                } else {
                    stats.unchanged += 1;
                }
            }
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|u| u.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            let entries: Vec<Entry> = pending
                .into_iter()
                .zip(embeddings)
                .map(|(unit, embedding)| unit.into_entry(embedding))
                .collect();

            stats.written = self.store.upsert(entries).await?;
        }

        self.store.set_last_built(now_secs()).await?;

        info!(
            "Index pass complete: {} scanned, {} written, {} unchanged, {} failed",
            stats.scanned, stats.written, stats.unchanged, stats.failed
        );
        Ok(stats)
    }

    /// Re-scan on a fixed interval. Never holds a store lock across I/O, so
    /// foreground queries are not blocked; a crash mid-pass leaves entries
    /// stale until the next tick, never corrupted.
    pub fn spawn_background(self: Arc<Self>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                match self.run_pass().await {
                    Ok(stats) => {
                        debug!("Background rescan: {} written", stats.written)
                    }
                    Err(e) => warn!("Background rescan failed: {}", e),
                }
            }
        })
    }
}

struct PendingUnit {
    id: String,
    corpus: Corpus,
    text: String,
    content_hash: String,
    path: String,
    last_modified: i64,
}

impl PendingUnit {
    fn into_entry(self, embedding: Vec<f32>) -> Entry {
        let entry_type = classify_entry_type(&self.path, self.corpus);
        let priority = default_priority(&self.path, entry_type, self.corpus);
        Entry {
            id: self.id,
            corpus: self.corpus,
            text: self.text,
            embedding,
            metadata: EntryMetadata {
                module_owner: module_owner(&self.path),
                path: self.path,
                entry_type,
                priority,
                last_modified: self.last_modified,
                content_hash: self.content_hash,
            },
        }
    }
}

fn corpus_for(path: &Path) -> Option<Corpus> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if CODE_EXTENSIONS.contains(&ext.as_str()) {
        Some(Corpus::Code)
    } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
        Some(Corpus::Document)
    } else {
        None
    }
}

fn classify_entry_type(path: &str, corpus: Corpus) -> EntryType {
    if corpus == Corpus::Code {
        return EntryType::Other;
    }
    let lower = path.to_lowercase();
    let file = lower.rsplit('/').next().unwrap_or(&lower);
    if file.starts_with("readme") {
        EntryType::ModuleReadme
    } else if file.starts_with("changelog") {
        EntryType::Changelog
    } else if lower.contains("protocol") {
        EntryType::ProtocolDoc
    } else if lower.contains("interface") || lower.contains("spec") {
        EntryType::InterfaceSpec
    } else {
        EntryType::Other
    }
}

fn default_priority(path: &str, entry_type: EntryType, corpus: Corpus) -> u8 {
    match entry_type {
        EntryType::ModuleReadme | EntryType::InterfaceSpec => 8,
        EntryType::ProtocolDoc => 7,
        EntryType::Changelog => 5,
        EntryType::Other => {
            if corpus == Corpus::Code {
                let file = path.rsplit('/').next().unwrap_or(path);
                if matches!(file, "main.rs" | "lib.rs" | "mod.rs" | "__init__.py") {
                    8
                } else {
                    6
                }
            } else {
                4
            }
        }
    }
}

/// Nearest enclosing module: the parent directory, when there is one.
fn module_owner(path: &str) -> Option<String> {
    let (dir, _file) = path.rsplit_once('/')?;
    Some(dir.to_string())
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn truncate_chars(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        text
    } else {
        text.chars().take(max).collect()
    }
}

fn file_mtime(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;

    fn test_indexer(root: &Path) -> Indexer {
        let store = Arc::new(EntryStore::in_memory());
        let embedder = Arc::new(Embedder::new(Arc::new(MockEmbedder::new()), 1, 1));
        Indexer::new(store, embedder, vec![root.to_path_buf()])
    }

    #[tokio::test]
    async fn second_pass_on_unchanged_tree_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/b.py"), "def locate(): pass").unwrap();
        std::fs::write(dir.path().join("a/README.md"), "# module a").unwrap();

        let indexer = test_indexer(dir.path());
        let first = indexer.run_pass().await.unwrap();
        assert_eq!(first.written, 2);

        let second = indexer.run_pass().await.unwrap();
        assert_eq!(second.written, 0, "unchanged corpus must produce zero writes");
        assert_eq!(second.unchanged, 2);
    }

    #[tokio::test]
    async fn changed_file_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "v1").unwrap();

        let indexer = test_indexer(dir.path());
        indexer.run_pass().await.unwrap();

        std::fs::write(dir.path().join("notes.md"), "v2").unwrap();
        let stats = indexer.run_pass().await.unwrap();
        assert_eq!(stats.written, 1);
    }

    #[test]
    fn entry_type_classification() {
        assert_eq!(
            classify_entry_type("a/README.md", Corpus::Document),
            EntryType::ModuleReadme
        );
        assert_eq!(
            classify_entry_type("docs/wire-protocol.md", Corpus::Document),
            EntryType::ProtocolDoc
        );
        assert_eq!(
            classify_entry_type("CHANGELOG.md", Corpus::Document),
            EntryType::Changelog
        );
        assert_eq!(
            classify_entry_type("a/b.py", Corpus::Code),
            EntryType::Other
        );
    }
}
