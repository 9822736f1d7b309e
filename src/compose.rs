//! Report composition: fixed sections, alert deduplication, next actions
//!
//! Composition is pure: identical (intent, findings, research, alerts) input
//! renders byte-identical text. The composer never fails; zero findings
//! renders a minimal report instead of blank output.

use crate::types::{Alert, Finding, Intent, IntentCategory, Report, Severity};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Static intent → suggested-action template. `{ref}` is interpolated with
/// the top finding's first reference when one exists.
fn action_template(category: IntentCategory) -> &'static str {
    match category {
        IntentCategory::DocLookup => "Read {ref} end to end; it is the closest documentation match.",
        IntentCategory::CodeLocation => "Open {ref} and confirm it contains what you are after.",
        IntentCategory::ModuleHealth => "Review {ref} first; it carries the weakest health signal.",
        IntentCategory::Research => "Cross-check the references above, starting with {ref}.",
        IntentCategory::General => "Refine the query with more specific wording to narrow the intent.",
    }
}

pub struct OutputComposer;

impl OutputComposer {
    pub fn compose(
        intent: &Intent,
        findings: &[Finding],
        research: Option<&str>,
        engine_alerts: &[Alert],
    ) -> Report {
        let mut out = String::new();

        let _ = writeln!(out, "[INTENT]");
        let _ = writeln!(out, "{} (confidence {:.2})", intent.category, intent.confidence);
        out.push('\n');

        let _ = writeln!(out, "[FINDINGS]");
        if findings.is_empty() {
            let _ = writeln!(out, "no components completed; nothing to report");
        }
        for finding in findings {
            match finding.severity {
                Severity::Info => {
                    let _ = writeln!(out, "- {}: {}", finding.component_name, finding.summary);
                }
                Severity::Warning => {
                    let _ = writeln!(
                        out,
                        "- {} [WARNING]: {}",
                        finding.component_name, finding.summary
                    );
                }
                Severity::Degraded => {
                    let _ = writeln!(
                        out,
                        "- {} [DEGRADED]: {}",
                        finding.component_name, finding.summary
                    );
                }
            }
            if !finding.references.is_empty() {
                let _ = writeln!(out, "  refs: {}", finding.references.join(", "));
            }
        }
        out.push('\n');

        if let Some(text) = research {
            let _ = writeln!(out, "[RESEARCH]");
            let _ = writeln!(out, "{}", text.trim_end());
            out.push('\n');
        }

        let _ = writeln!(out, "[ALERTS]");
        let deduped = dedupe_alerts(findings, engine_alerts);
        if deduped.is_empty() {
            let _ = writeln!(out, "none");
        }
        for line in deduped {
            let _ = writeln!(out, "{}", line);
        }
        out.push('\n');

        let _ = writeln!(out, "[NEXT ACTIONS]");
        let _ = writeln!(out, "- {}", next_action(intent.category, findings));

        let degraded = findings.iter().any(|f| f.severity == Severity::Degraded);
        Report {
            text: out,
            intent: *intent,
            degraded,
        }
    }
}

/// Group raw alerts by category. Categories with more than one raw
/// occurrence collapse to a count-annotated line with one representative
/// example; singletons render verbatim. Output order is category-sorted,
/// which keeps rendering deterministic.
fn dedupe_alerts(findings: &[Finding], engine_alerts: &[Alert]) -> Vec<String> {
    let mut groups: BTreeMap<&str, Vec<&Alert>> = BTreeMap::new();
    for alert in findings
        .iter()
        .flat_map(|f| f.alerts.iter())
        .chain(engine_alerts.iter())
    {
        groups.entry(alert.category.as_str()).or_default().push(alert);
    }

    groups
        .into_iter()
        .map(|(category, alerts)| {
            let total: usize = alerts.iter().map(|a| a.count).sum();
            if total > 1 {
                let example = alerts
                    .iter()
                    .flat_map(|a| a.examples.iter())
                    .next()
                    .cloned()
                    .unwrap_or_else(|| alerts[0].message.clone());
                format!("{} occurrences: {} (e.g. {})", total, category, example)
            } else {
                alerts[0].message.clone()
            }
        })
        .collect()
}

fn next_action(category: IntentCategory, findings: &[Finding]) -> String {
    let template = action_template(category);
    let top_ref = findings
        .iter()
        .find(|f| !f.references.is_empty())
        .map(|f| f.references[0].as_str())
        .unwrap_or("the top match");
    template.replace("{ref}", top_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(category: IntentCategory) -> Intent {
        Intent {
            category,
            confidence: 0.75,
        }
    }

    fn info_finding(name: &str, refs: &[&str], alerts: Vec<Alert>) -> Finding {
        Finding {
            component_name: name.to_string(),
            summary: format!("{} summary", name),
            severity: Severity::Info,
            alerts,
            references: refs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn sections_render_in_fixed_order() {
        let findings = vec![info_finding("code_locator", &["a/b.py"], vec![])];
        let report = OutputComposer::compose(
            &intent(IntentCategory::CodeLocation),
            &findings,
            None,
            &[],
        );

        let intent_pos = report.text.find("[INTENT]").unwrap();
        let findings_pos = report.text.find("[FINDINGS]").unwrap();
        let alerts_pos = report.text.find("[ALERTS]").unwrap();
        let actions_pos = report.text.find("[NEXT ACTIONS]").unwrap();
        assert!(intent_pos < findings_pos);
        assert!(findings_pos < alerts_pos);
        assert!(alerts_pos < actions_pos);
        assert!(!report.text.contains("[RESEARCH]"));
    }

    #[test]
    fn research_is_kept_separate_from_findings() {
        let findings = vec![info_finding("doc_retriever", &["a/README.md"], vec![])];
        let report = OutputComposer::compose(
            &intent(IntentCategory::Research),
            &findings,
            Some("background prose"),
            &[],
        );
        let findings_pos = report.text.find("[FINDINGS]").unwrap();
        let research_pos = report.text.find("[RESEARCH]").unwrap();
        let alerts_pos = report.text.find("[ALERTS]").unwrap();
        assert!(findings_pos < research_pos && research_pos < alerts_pos);
        assert!(report.text.contains("background prose"));
    }

    #[test]
    fn repeated_alerts_collapse_with_count() {
        let alerts: Vec<Alert> = (0..87)
            .map(|i| Alert::new("stale_doc", format!("doc {} is stale", i)))
            .collect();
        let findings = vec![info_finding("module_health", &[], alerts)];
        let report =
            OutputComposer::compose(&intent(IntentCategory::ModuleHealth), &findings, None, &[]);

        assert!(report.text.contains("87 occurrences: stale_doc"));
        // Exactly one stale_doc line survives.
        assert_eq!(report.text.matches("stale_doc").count(), 1);
    }

    #[test]
    fn singleton_alert_renders_verbatim() {
        let findings = vec![info_finding(
            "module_health",
            &[],
            vec![Alert::new("stale_doc", "docs/a.md not modified for 90 days")],
        )];
        let report =
            OutputComposer::compose(&intent(IntentCategory::ModuleHealth), &findings, None, &[]);
        assert!(report.text.contains("docs/a.md not modified for 90 days"));
        assert!(!report.text.contains("occurrences"));
    }

    #[test]
    fn composition_is_byte_identical() {
        let findings = vec![info_finding(
            "doc_retriever",
            &["docs/protocol.md"],
            vec![Alert::new("no_code_matches", "nothing matched")],
        )];
        let a = OutputComposer::compose(&intent(IntentCategory::DocLookup), &findings, None, &[]);
        let b = OutputComposer::compose(&intent(IntentCategory::DocLookup), &findings, None, &[]);
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn zero_findings_still_renders_a_report() {
        let report = OutputComposer::compose(&intent(IntentCategory::General), &[], None, &[]);
        assert!(report.text.contains("no components completed"));
        assert!(report.text.contains("[NEXT ACTIONS]"));
    }

    #[test]
    fn next_action_interpolates_top_reference() {
        let findings = vec![info_finding("code_locator", &["a/b.py"], vec![])];
        let report = OutputComposer::compose(
            &intent(IntentCategory::CodeLocation),
            &findings,
            None,
            &[],
        );
        assert!(report.text.contains("Open a/b.py"));
    }
}
