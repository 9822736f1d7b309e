//! Component execution with time and cost budgets
//!
//! Components run concurrently up to the configured worker count, each under
//! its own timeout. A timeout or component error becomes a DEGRADED finding,
//! never a request failure. The cost ceiling is applied over the decision
//! list in order; everything past it is recorded as skipped_over_budget.

use crate::components::AnalysisComponent;
use crate::config::EngineConfig;
use crate::error::WaypointError;
use crate::registry::ComponentRegistry;
use crate::types::{
    Alert, Finding, OrchestrationDecision, Query, SearchResults, Severity, SkipReason,
};
use futures::stream::{FuturesOrdered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct ExecutionOutcome {
    pub findings: Vec<Finding>,
    pub skipped_over_budget: Vec<String>,
    pub cost_spent: u32,
}

pub struct Orchestrator<'a> {
    registry: &'a ComponentRegistry,
    config: &'a EngineConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a ComponentRegistry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Execute every included decision, re-applying the cost ceiling over
    /// the decision order (routing for GENERAL bypasses it). Findings come
    /// back in decision order regardless of completion order.
    pub async fn execute(
        &self,
        query: &Query,
        results: &SearchResults,
        decisions: &mut [OrchestrationDecision],
    ) -> ExecutionOutcome {
        let mut planned: Vec<Arc<dyn AnalysisComponent>> = Vec::new();
        let mut skipped_over_budget = Vec::new();
        let mut cost_spent: u32 = 0;

        for decision in decisions.iter_mut() {
            if !decision.included {
                continue;
            }
            let Some(component) = self.registry.get(&decision.component_name) else {
                warn!("Decision names unknown component {}", decision.component_name);
                decision.included = false;
                continue;
            };
            let cost = component.descriptor().estimated_cost;
            if cost_spent + cost > self.config.component_budget {
                decision.included = false;
                decision.skip_reason = Some(SkipReason::OverBudget);
                skipped_over_budget.push(decision.component_name.clone());
                continue;
            }
            cost_spent += cost;
            planned.push(component);
        }

        if !skipped_over_budget.is_empty() {
            info!(
                "Budget ceiling reached: skipping {}",
                skipped_over_budget.join(", ")
            );
        }

        let timeout = Duration::from_millis(self.config.component_timeout_ms);
        // Bounded sliding window of `worker_count` concurrent components;
        // FuturesOrdered preserves input order, so findings land in decision
        // order no matter which component finishes first. (Written out instead
        // of `stream::map(..).buffered(..)` because that combinator chain trips
        // a higher-ranked-lifetime limitation once the resulting future has to
        // be Send for the axum handler.)
        let worker_count = self.config.worker_count.max(1);
        let mut pending = planned.into_iter();
        let mut in_flight = FuturesOrdered::new();
        for component in pending.by_ref().take(worker_count) {
            in_flight.push_back(run_component(component, query, results, timeout));
        }
        let mut findings: Vec<Finding> = Vec::new();
        while let Some(finding) = in_flight.next().await {
            findings.push(finding);
            if let Some(component) = pending.next() {
                in_flight.push_back(run_component(component, query, results, timeout));
            }
        }

        ExecutionOutcome {
            findings,
            skipped_over_budget,
            cost_spent,
        }
    }
}

async fn run_component(
    component: Arc<dyn AnalysisComponent>,
    query: &Query,
    results: &SearchResults,
    timeout: Duration,
) -> Finding {
    let name = component.descriptor().name;
    match tokio::time::timeout(timeout, component.analyze(query, results)).await {
        Ok(Ok(finding)) => finding,
        Ok(Err(e)) => {
            warn!("Component {} failed: {:?}", name, e);
            degraded_finding(name, format!("component failed: {}", e), "component_error")
        }
        Err(_) => {
            let err = WaypointError::ComponentTimeout(name.to_string());
            warn!("{} after {:?}", err, timeout);
            degraded_finding(
                name,
                format!("{} ({}ms budget)", err, timeout.as_millis()),
                "component_timeout",
            )
        }
    }
}

fn degraded_finding(name: &str, message: String, category: &str) -> Finding {
    Finding {
        component_name: name.to_string(),
        summary: message.clone(),
        severity: Severity::Degraded,
        alerts: vec![Alert::new(category, message)],
        references: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ReferenceMapper;
    use crate::types::ComponentDescriptor;
    use anyhow::Result;
    use async_trait::async_trait;

    struct SlowComponent;

    #[async_trait]
    impl AnalysisComponent for SlowComponent {
        fn descriptor(&self) -> ComponentDescriptor {
            ComponentDescriptor {
                name: "slow_component",
                capability_tags: &["slow"],
                estimated_cost: 1,
            }
        }

        async fn analyze(&self, _q: &Query, _r: &SearchResults) -> Result<Finding> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            unreachable!("timeout fires first")
        }
    }

    fn decision(name: &str) -> OrchestrationDecision {
        OrchestrationDecision {
            component_name: name.to_string(),
            relevance_weight: 1.0,
            included: true,
            skip_reason: None,
        }
    }

    #[tokio::test]
    async fn timeout_becomes_degraded_finding() {
        let registry = ComponentRegistry::new(vec![Arc::new(SlowComponent)]);
        let config = EngineConfig {
            component_timeout_ms: 20,
            ..EngineConfig::default()
        };
        let orchestrator = Orchestrator::new(&registry, &config);

        let mut decisions = vec![decision("slow_component")];
        let outcome = orchestrator
            .execute(&Query::new("q"), &SearchResults::default(), &mut decisions)
            .await;

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].severity, Severity::Degraded);
        assert_eq!(outcome.findings[0].alerts[0].category, "component_timeout");
    }

    #[tokio::test]
    async fn ceiling_skips_remainder_in_order() {
        let registry = ComponentRegistry::new(vec![
            Arc::new(ReferenceMapper),
            Arc::new(SlowComponent),
        ]);
        let config = EngineConfig {
            component_budget: 1,
            component_timeout_ms: 50,
            ..EngineConfig::default()
        };
        let orchestrator = Orchestrator::new(&registry, &config);

        let mut decisions = vec![decision("reference_mapper"), decision("slow_component")];
        let outcome = orchestrator
            .execute(&Query::new("q"), &SearchResults::default(), &mut decisions)
            .await;

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].component_name, "reference_mapper");
        assert_eq!(outcome.skipped_over_budget, vec!["slow_component"]);
        assert_eq!(decisions[1].skip_reason, Some(SkipReason::OverBudget));
    }
}
