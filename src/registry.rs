//! Component registry and weight-driven routing
//!
//! The registry is the static catalog; the router turns an intent plus the
//! learned weight table into an ordered, budget-constrained decision list.
//! Excluded candidates stay in the list with a skip reason so routing is
//! observable, never silently truncated.

use crate::components::AnalysisComponent;
use crate::config::EngineConfig;
use crate::feedback::WeightTable;
use crate::types::{
    ComponentDescriptor, Intent, IntentCategory, OrchestrationDecision, SkipReason,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Static intent → candidate component table. GENERAL is handled separately:
/// it takes the full catalog.
fn candidates_for(category: IntentCategory) -> &'static [&'static str] {
    match category {
        IntentCategory::DocLookup => &["doc_retriever", "doc_freshness", "reference_mapper"],
        IntentCategory::CodeLocation => &["code_locator", "reference_mapper"],
        IntentCategory::ModuleHealth => &["module_health", "doc_freshness", "reference_mapper"],
        IntentCategory::Research => &["doc_retriever", "code_locator", "reference_mapper"],
        IntentCategory::General => &[],
    }
}

pub struct ComponentRegistry {
    components: Vec<Arc<dyn AnalysisComponent>>,
}

impl ComponentRegistry {
    pub fn new(components: Vec<Arc<dyn AnalysisComponent>>) -> Self {
        Self { components }
    }

    pub fn catalog(&self) -> Vec<ComponentDescriptor> {
        self.components.iter().map(|c| c.descriptor()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisComponent>> {
        self.components
            .iter()
            .find(|c| c.descriptor().name == name)
            .cloned()
    }

    fn descriptor(&self, name: &str) -> Option<ComponentDescriptor> {
        self.components
            .iter()
            .map(|c| c.descriptor())
            .find(|d| d.name == name)
    }

    /// Select an ordered, budget-constrained subset of candidates for the
    /// intent. GENERAL bypasses weight filtering and routes the full catalog
    /// (breadth over precision when the intent is unknown); the orchestrator
    /// still enforces the execution-time ceiling.
    pub fn route(
        &self,
        intent: &Intent,
        weights: &WeightTable,
        config: &EngineConfig,
    ) -> Vec<OrchestrationDecision> {
        if intent.category == IntentCategory::General {
            let decisions: Vec<OrchestrationDecision> = self
                .catalog()
                .into_iter()
                .map(|d| OrchestrationDecision {
                    component_name: d.name.to_string(),
                    relevance_weight: weights.get(IntentCategory::General, d.name),
                    included: true,
                    skip_reason: None,
                })
                .collect();
            info!("Routing GENERAL: full catalog ({} components)", decisions.len());
            return decisions;
        }

        let mut candidates: Vec<(ComponentDescriptor, f32)> = candidates_for(intent.category)
            .iter()
            .filter_map(|name| self.descriptor(name))
            .map(|d| {
                let weight = weights.get(intent.category, d.name);
                (d, weight)
            })
            .collect();

        // Weight-descending, name-ascending on ties, for determinism.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.name.cmp(b.0.name)));

        let mut decisions = Vec::with_capacity(candidates.len());
        let mut spent: u32 = 0;
        for (descriptor, weight) in candidates {
            let (included, skip_reason) = if weight <= config.weight_floor {
                (false, Some(SkipReason::ZeroWeight))
            } else if spent + descriptor.estimated_cost > config.component_budget {
                (false, Some(SkipReason::OverBudget))
            } else {
                spent += descriptor.estimated_cost;
                (true, None)
            };
            debug!(
                "Routing {} for {}: weight={:.2} included={}",
                descriptor.name, intent.category, weight, included
            );
            decisions.push(OrchestrationDecision {
                component_name: descriptor.name.to_string(),
                relevance_weight: weight,
                included,
                skip_reason,
            });
        }

        self.apply_floor_override(intent.category, &mut decisions, config);

        info!(
            "Routing {}: {}/{} candidates included (cost {}/{})",
            intent.category,
            decisions.iter().filter(|d| d.included).count(),
            decisions.len(),
            spent,
            config.component_budget
        );
        decisions
    }

    /// Learning must never fully silence a structurally necessary component:
    /// if an essential capability for this intent has no included provider,
    /// force the weight-decayed sole provider back in.
    fn apply_floor_override(
        &self,
        category: IntentCategory,
        decisions: &mut [OrchestrationDecision],
        config: &EngineConfig,
    ) {
        for (intent, tag) in &config.essential_capabilities {
            if *intent != category {
                continue;
            }
            let covered = decisions.iter().any(|d| {
                d.included
                    && self
                        .descriptor(&d.component_name)
                        .map(|desc| desc.capability_tags.contains(tag))
                        .unwrap_or(false)
            });
            if covered {
                continue;
            }
            let provider = decisions.iter_mut().find(|d| {
                d.skip_reason == Some(SkipReason::ZeroWeight)
                    && self
                        .descriptor(&d.component_name)
                        .map(|desc| desc.capability_tags.contains(tag))
                        .unwrap_or(false)
            });
            if let Some(decision) = provider {
                info!(
                    "Floor override: forcing {} for {} (sole {} provider)",
                    decision.component_name, category, tag
                );
                decision.included = true;
                decision.skip_reason = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        CodeLocator, DocFreshnessAuditor, DocRetriever, ModuleHealthScanner, ReferenceMapper,
    };

    fn full_registry() -> ComponentRegistry {
        ComponentRegistry::new(vec![
            Arc::new(DocRetriever),
            Arc::new(CodeLocator::new(vec![])),
            Arc::new(ModuleHealthScanner),
            Arc::new(DocFreshnessAuditor),
            Arc::new(ReferenceMapper),
        ])
    }

    fn intent(category: IntentCategory) -> Intent {
        Intent {
            category,
            confidence: 0.8,
        }
    }

    #[test]
    fn general_routes_the_full_catalog() {
        let registry = full_registry();
        let decisions = registry.route(
            &intent(IntentCategory::General),
            &WeightTable::default(),
            &EngineConfig::default(),
        );
        assert_eq!(decisions.len(), 5);
        assert!(decisions.iter().all(|d| d.included));
    }

    #[test]
    fn budget_exclusions_are_kept_with_reason() {
        let registry = full_registry();
        let config = EngineConfig {
            component_budget: 3,
            ..EngineConfig::default()
        };
        let decisions = registry.route(
            &intent(IntentCategory::ModuleHealth),
            &WeightTable::default(),
            &config,
        );
        // Catalog costs: module_health 3, doc_freshness 2, reference_mapper 1.
        let included: Vec<_> = decisions.iter().filter(|d| d.included).collect();
        let excluded: Vec<_> = decisions.iter().filter(|d| !d.included).collect();
        assert!(!included.is_empty());
        assert!(!excluded.is_empty());
        assert!(excluded
            .iter()
            .all(|d| d.skip_reason == Some(SkipReason::OverBudget)));
        let spent: u32 = included
            .iter()
            .map(|d| registry.descriptor(&d.component_name).unwrap().estimated_cost)
            .sum();
        assert!(spent <= config.component_budget);
    }

    #[test]
    fn floor_override_keeps_sole_protocol_provider() {
        let registry = full_registry();
        let mut weights = WeightTable::default();
        weights.set(IntentCategory::DocLookup, "doc_retriever", 0.0);

        let decisions = registry.route(
            &intent(IntentCategory::DocLookup),
            &weights,
            &EngineConfig::default(),
        );
        let doc_retriever = decisions
            .iter()
            .find(|d| d.component_name == "doc_retriever")
            .unwrap();
        assert!(
            doc_retriever.included,
            "sole protocol-lookup provider must survive weight decay"
        );
    }

    #[test]
    fn decayed_non_essential_component_is_excluded() {
        let registry = full_registry();
        let mut weights = WeightTable::default();
        weights.set(IntentCategory::DocLookup, "reference_mapper", 0.0);

        let decisions = registry.route(
            &intent(IntentCategory::DocLookup),
            &weights,
            &EngineConfig::default(),
        );
        let mapper = decisions
            .iter()
            .find(|d| d.component_name == "reference_mapper")
            .unwrap();
        assert!(!mapper.included);
        assert_eq!(mapper.skip_reason, Some(SkipReason::ZeroWeight));
    }
}
