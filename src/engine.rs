//! Core NavEngine: the end-to-end query pipeline
//!
//! embed → search → classify → route → orchestrate → compose, returned as
//! one blocking call. Feedback flows back through the learner and changes
//! routing on the next query, never the current one.

use crate::advisor::AdvisorClient;
use crate::compose::OutputComposer;
use crate::config::EngineConfig;
use crate::error::WaypointError;
use crate::feedback::FeedbackLearner;
use crate::intent::IntentClassifier;
use crate::orchestrator::Orchestrator;
use crate::registry::ComponentRegistry;
use crate::search::SemanticSearchEngine;
use crate::types::{
    Alert, FeedbackRecord, Intent, IntentCategory, Query, QueryOutcome, QueryStats, SearchResults,
    Severity,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Main navigation engine (thread-safe via Arc)
pub struct NavEngine {
    search: SemanticSearchEngine,
    classifier: IntentClassifier,
    registry: ComponentRegistry,
    learner: Arc<FeedbackLearner>,
    advisor: Option<AdvisorClient>,
    config: EngineConfig,
}

pub type SharedNavEngine = Arc<NavEngine>;

impl NavEngine {
    pub fn new(
        search: SemanticSearchEngine,
        registry: ComponentRegistry,
        learner: Arc<FeedbackLearner>,
        advisor: Option<AdvisorClient>,
        config: EngineConfig,
    ) -> SharedNavEngine {
        Arc::new(Self {
            search,
            classifier: IntentClassifier::new(),
            registry,
            learner,
            advisor,
            config,
        })
    }

    /// Main entry point: answer one query with a structured report.
    pub async fn answer(&self, query: Query) -> Result<QueryOutcome, WaypointError> {
        let start = Instant::now();
        self.validate(&query)?;

        info!("Answering query: '{}' (limit {})", query.text, query.limit);

        // Step 1: semantic search over both corpora.
        let results = self.search.search(&query).await?;

        // Step 2: classify intent. Pure function of the query text.
        let intent = self.classifier.classify(&query.text);
        info!(
            "Intent: {} (confidence {:.2})",
            intent.category, intent.confidence
        );

        // Step 3: route against the learned weights.
        let weights = self.learner.weights().await;
        let mut decisions = self.registry.route(&intent, &weights, &self.config);

        // Step 4: execute the included components.
        let orchestrator = Orchestrator::new(&self.registry, &self.config);
        let outcome = orchestrator.execute(&query, &results, &mut decisions).await;

        // Step 5: optional advisor narration, best-effort.
        let research = self.fetch_research(&intent, &query, &results).await;

        // Step 6: compose the report.
        let engine_alerts = self.engine_alerts(&results, &outcome.skipped_over_budget);
        let report = OutputComposer::compose(
            &intent,
            &outcome.findings,
            research.as_deref(),
            &engine_alerts,
        );

        let stats = QueryStats {
            components_run: outcome.findings.len(),
            components_skipped: decisions.iter().filter(|d| !d.included).count(),
            components_degraded: outcome
                .findings
                .iter()
                .filter(|f| f.severity == Severity::Degraded)
                .count(),
            cost_spent: outcome.cost_spent,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Query complete: {} findings, {} skipped, {}ms",
            stats.components_run, stats.components_skipped, stats.elapsed_ms
        );

        Ok(QueryOutcome {
            report,
            decisions,
            stats,
        })
    }

    /// Forward a caller rating into the learner. Routing reads the updated
    /// table on the next query.
    pub async fn record_feedback(&self, record: FeedbackRecord) -> anyhow::Result<()> {
        self.learner.record(record).await
    }

    fn validate(&self, query: &Query) -> Result<(), WaypointError> {
        if query.text.trim().is_empty() {
            return Err(WaypointError::MalformedQuery("empty query text".to_string()));
        }
        if query.text.len() > self.config.max_query_len {
            return Err(WaypointError::MalformedQuery(format!(
                "query exceeds {} characters",
                self.config.max_query_len
            )));
        }
        Ok(())
    }

    async fn fetch_research(
        &self,
        intent: &Intent,
        query: &Query,
        results: &SearchResults,
    ) -> Option<String> {
        let advisor = self.advisor.as_ref()?;
        if !matches!(
            intent.category,
            IntentCategory::Research | IntentCategory::General
        ) {
            return None;
        }

        let references: Vec<&str> = results
            .code_hits
            .iter()
            .chain(results.doc_hits.iter())
            .take(5)
            .map(|h| h.entry.metadata.path.as_str())
            .collect();
        let prompt = format!(
            "Give brief background for the question: {}\nKnown references: {}",
            query.text,
            references.join(", ")
        );

        match advisor.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Advisor unavailable, omitting research section: {:?}", e);
                None
            }
        }
    }

    fn engine_alerts(&self, results: &SearchResults, skipped: &[String]) -> Vec<Alert> {
        let mut alerts = Vec::new();
        if results.stale {
            alerts.push(Alert::new(
                "stale_index",
                "similarity index is older than the staleness window; results may be out of date",
            ));
        }
        for name in skipped {
            alerts.push(
                Alert::new(
                    "skipped_over_budget",
                    format!("{} skipped after the cost ceiling was reached", name),
                )
                .with_example(name.clone()),
            );
        }
        alerts
    }
}
