//! Feedback learning: append-only log plus the learned weight table
//!
//! The raw record is appended to the immutable log before the weight delta
//! is applied, so the table can always be rebuilt by replaying the log.
//! MISSING ratings never touch weights; they land in a suggestion log for
//! manual review.

use crate::types::{FeedbackRating, FeedbackRecord, IntentCategory};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Learned routing preference per (intent, component) cell. Absent cells
/// read as the neutral 1.0. Mutated only through the learner.
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    cells: HashMap<(IntentCategory, String), f32>,
}

impl WeightTable {
    pub fn get(&self, intent: IntentCategory, component: &str) -> f32 {
        self.cells
            .get(&(intent, component.to_string()))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn set(&mut self, intent: IntentCategory, component: &str, weight: f32) {
        self.cells.insert((intent, component.to_string()), weight);
    }

    pub fn cells(&self) -> impl Iterator<Item = (&(IntentCategory, String), &f32)> {
        self.cells.iter()
    }
}

/// JSON shape for the persisted table: one row per cell, sorted on save so
/// the file is diff-stable.
#[derive(Debug, Serialize, Deserialize)]
struct WeightCell {
    intent: IntentCategory,
    component: String,
    weight: f32,
}

/// Tunables for the update rule.
#[derive(Debug, Clone, Copy)]
pub struct LearnerConfig {
    pub delta_good: f32,
    pub delta_noisy: f32,
    pub weight_cap: f32,
}

pub struct FeedbackLearner {
    log_path: PathBuf,
    suggestion_path: PathBuf,
    weights_path: Option<PathBuf>,
    weights: RwLock<WeightTable>,
    config: LearnerConfig,
}

impl FeedbackLearner {
    /// Open the learner over a state directory. The feedback log, the
    /// suggestion log and the weight table are independent files; losing one
    /// does not corrupt the others.
    pub fn open(state_dir: impl AsRef<Path>, config: LearnerConfig) -> Result<Self> {
        let dir = state_dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create state dir {}", dir.display()))?;

        let weights_path = dir.join("weights.json");
        let weights = match std::fs::read(&weights_path) {
            Ok(bytes) => {
                let cells: Vec<WeightCell> =
                    serde_json::from_slice(&bytes).context("corrupt weight table")?;
                let mut table = WeightTable::default();
                for cell in cells {
                    table.set(cell.intent, &cell.component, cell.weight);
                }
                table
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WeightTable::default(),
            Err(e) => return Err(e).context("cannot read weight table"),
        };

        info!("Feedback learner opened ({} learned cells)", weights.cells.len());

        Ok(Self {
            log_path: dir.join("feedback.jsonl"),
            suggestion_path: dir.join("suggestions.jsonl"),
            weights_path: Some(weights_path),
            weights: RwLock::new(weights),
            config,
        })
    }

    /// Volatile learner for tests and mock mode.
    pub fn in_memory(config: LearnerConfig) -> Self {
        Self {
            log_path: PathBuf::new(),
            suggestion_path: PathBuf::new(),
            weights_path: None,
            weights: RwLock::new(WeightTable::default()),
            config,
        }
    }

    /// Append the record, then apply the weight delta. The append happens
    /// first so a crash between the two steps loses only the in-memory
    /// delta, which replay reconstructs.
    pub async fn record(&self, record: FeedbackRecord) -> Result<()> {
        if self.weights_path.is_some() {
            append_jsonl(&self.log_path, &record).context("cannot append feedback log")?;
        }

        match record.rating {
            FeedbackRating::Missing => {
                // Never auto-creates routing entries; reviewed by hand.
                if self.weights_path.is_some() {
                    append_jsonl(&self.suggestion_path, &record)
                        .context("cannot append suggestion log")?;
                }
                debug!(
                    "Feedback MISSING for intent {} logged as suggestion",
                    record.intent_category
                );
            }
            rating => {
                let mut weights = self.weights.write().await;
                apply_delta(&mut weights, &record, rating, self.config);
                if self.weights_path.is_some() {
                    self.persist_weights(&weights)?;
                }
            }
        }

        Ok(())
    }

    /// Snapshot for the router. Cells are independent, so a clone taken here
    /// and a concurrent record() interleave per-cell last-writer-wins.
    pub async fn weights(&self) -> WeightTable {
        self.weights.read().await.clone()
    }

    /// Rebuild a weight table from scratch by replaying a feedback log.
    pub fn replay(log_path: impl AsRef<Path>, config: LearnerConfig) -> Result<WeightTable> {
        let content = std::fs::read_to_string(log_path.as_ref())
            .with_context(|| format!("cannot read {}", log_path.as_ref().display()))?;

        let mut table = WeightTable::default();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: FeedbackRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Skipping malformed feedback line {}: {}", lineno + 1, e);
                    continue;
                }
            };
            let rating = record.rating;
            apply_delta(&mut table, &record, rating, config);
        }
        Ok(table)
    }

    fn persist_weights(&self, weights: &WeightTable) -> Result<()> {
        let Some(ref path) = self.weights_path else {
            return Ok(());
        };
        let mut cells: Vec<WeightCell> = weights
            .cells
            .iter()
            .map(|((intent, component), weight)| WeightCell {
                intent: *intent,
                component: component.clone(),
                weight: *weight,
            })
            .collect();
        cells.sort_by(|a, b| {
            a.intent
                .to_string()
                .cmp(&b.intent.to_string())
                .then_with(|| a.component.cmp(&b.component))
        });
        let bytes = serde_json::to_vec_pretty(&cells)?;
        std::fs::write(path, bytes).context("cannot write weight table")?;
        Ok(())
    }
}

fn apply_delta(
    table: &mut WeightTable,
    record: &FeedbackRecord,
    rating: FeedbackRating,
    config: LearnerConfig,
) {
    let delta = match rating {
        FeedbackRating::Good => config.delta_good,
        FeedbackRating::Noisy => -config.delta_noisy,
        FeedbackRating::Missing => return,
    };
    for component in &record.components_used {
        let current = table.get(record.intent_category, component);
        let updated = (current + delta).clamp(0.0, config.weight_cap);
        table.set(record.intent_category, component, updated);
    }
}

fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(value)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: LearnerConfig = LearnerConfig {
        delta_good: 0.1,
        delta_noisy: 0.2,
        weight_cap: 2.0,
    };

    fn record(rating: FeedbackRating, components: &[&str]) -> FeedbackRecord {
        FeedbackRecord {
            query_text: "test".to_string(),
            intent_category: IntentCategory::DocLookup,
            components_used: components.iter().map(|s| s.to_string()).collect(),
            rating,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn noisy_feedback_decays_weight_to_zero() {
        let learner = FeedbackLearner::in_memory(TEST_CONFIG);
        for _ in 0..5 {
            learner
                .record(record(FeedbackRating::Noisy, &["doc_retriever"]))
                .await
                .unwrap();
        }
        let weights = learner.weights().await;
        assert_eq!(weights.get(IntentCategory::DocLookup, "doc_retriever"), 0.0);
    }

    #[tokio::test]
    async fn weights_stay_clamped() {
        let learner = FeedbackLearner::in_memory(TEST_CONFIG);
        for _ in 0..40 {
            learner
                .record(record(FeedbackRating::Good, &["doc_retriever"]))
                .await
                .unwrap();
        }
        for _ in 0..40 {
            learner
                .record(record(FeedbackRating::Noisy, &["code_locator"]))
                .await
                .unwrap();
        }
        let weights = learner.weights().await;
        for (_, weight) in weights.cells() {
            assert!(*weight >= 0.0 && *weight <= TEST_CONFIG.weight_cap);
        }
    }

    #[tokio::test]
    async fn missing_rating_never_touches_weights() {
        let learner = FeedbackLearner::in_memory(TEST_CONFIG);
        learner
            .record(record(FeedbackRating::Missing, &["doc_retriever"]))
            .await
            .unwrap();
        let weights = learner.weights().await;
        assert_eq!(weights.get(IntentCategory::DocLookup, "doc_retriever"), 1.0);
    }

    #[tokio::test]
    async fn replay_rebuilds_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let learner = FeedbackLearner::open(dir.path(), TEST_CONFIG).unwrap();
        learner
            .record(record(FeedbackRating::Good, &["doc_retriever"]))
            .await
            .unwrap();
        learner
            .record(record(FeedbackRating::Noisy, &["doc_retriever"]))
            .await
            .unwrap();

        let live = learner.weights().await;
        let replayed =
            FeedbackLearner::replay(dir.path().join("feedback.jsonl"), TEST_CONFIG).unwrap();
        assert_eq!(
            live.get(IntentCategory::DocLookup, "doc_retriever"),
            replayed.get(IntentCategory::DocLookup, "doc_retriever"),
        );
    }
}
