//! Table-driven intent classification
//!
//! A pure function of the query text and the static pattern table: each
//! matching phrase contributes a fixed weight, the category with the highest
//! accumulated weight wins, and everything below the floor falls back to
//! GENERAL with zero confidence.

use crate::types::{Intent, IntentCategory};

struct Pattern {
    phrase: &'static str,
    weight: f32,
}

const fn p(phrase: &'static str, weight: f32) -> Pattern {
    Pattern { phrase, weight }
}

/// Ordered rule list. Earlier categories win exact ties.
const PATTERN_TABLE: &[(IntentCategory, &[Pattern])] = &[
    (
        IntentCategory::CodeLocation,
        &[
            p("where is", 2.0),
            p("where are", 2.0),
            p("located", 1.5),
            p("location of", 2.0),
            p("which file", 2.0),
            p("defined in", 1.5),
            p("definition of", 1.5),
            p("find the", 1.0),
            p("path to", 1.5),
            p("implementation of", 1.0),
        ],
    ),
    (
        IntentCategory::DocLookup,
        &[
            p("documentation", 2.0),
            p("docs for", 2.0),
            p("readme", 1.5),
            p("how do i", 1.5),
            p("how to", 1.0),
            p("protocol", 1.5),
            p("interface spec", 2.0),
            p("changelog", 1.5),
            p("guide", 1.0),
            p("usage", 1.0),
        ],
    ),
    (
        IntentCategory::ModuleHealth,
        &[
            p("health", 2.0),
            p("stale", 1.5),
            p("outdated", 1.5),
            p("up to date", 1.5),
            p("status of", 1.5),
            p("maintained", 1.0),
            p("coverage", 1.0),
        ],
    ),
    (
        IntentCategory::Research,
        &[
            p("research", 2.0),
            p("compare", 1.5),
            p("why does", 1.5),
            p("why is", 1.5),
            p("explain", 1.5),
            p("background on", 1.5),
            p("history of", 1.5),
            p("investigate", 1.5),
            p("trade-off", 1.0),
            p("tradeoff", 1.0),
        ],
    ),
];

/// Minimum accumulated weight for a category to claim the query.
const CONFIDENCE_FLOOR: f32 = 1.0;

#[derive(Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, query_text: &str) -> Intent {
        let text = query_text.to_lowercase();

        let mut best: Option<(IntentCategory, f32)> = None;
        let mut total = 0.0;
        for (category, patterns) in PATTERN_TABLE {
            let score: f32 = patterns
                .iter()
                .filter(|p| text.contains(p.phrase))
                .map(|p| p.weight)
                .sum();
            total += score;
            // Strictly-greater keeps the table order as the tie-break.
            if score > best.map(|(_, s)| s).unwrap_or(0.0) {
                best = Some((*category, score));
            }
        }

        match best {
            Some((category, score)) if score >= CONFIDENCE_FLOOR => Intent {
                category,
                confidence: (score / total).clamp(0.0, 1.0),
            },
            _ => Intent {
                category: IntentCategory::General,
                confidence: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_query_classifies_code_location() {
        let intent = IntentClassifier::new().classify("where is b located");
        assert_eq!(intent.category, IntentCategory::CodeLocation);
        assert!(intent.confidence > 0.5);
    }

    #[test]
    fn doc_query_classifies_doc_lookup() {
        let intent = IntentClassifier::new().classify("show the documentation for the wire protocol");
        assert_eq!(intent.category, IntentCategory::DocLookup);
    }

    #[test]
    fn health_query_classifies_module_health() {
        let intent = IntentClassifier::new().classify("is the parser module stale or up to date");
        assert_eq!(intent.category, IntentCategory::ModuleHealth);
    }

    #[test]
    fn unmatched_query_falls_back_to_general() {
        let intent = IntentClassifier::new().classify("zzzz qqqq");
        assert_eq!(intent.category, IntentCategory::General);
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = IntentClassifier::new();
        let a = classifier.classify("where is the codec defined in this repo");
        let b = classifier.classify("where is the codec defined in this repo");
        assert_eq!(a.category, b.category);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn confidence_is_normalized() {
        let intent = IntentClassifier::new().classify("where is the readme located");
        assert!(intent.confidence > 0.0 && intent.confidence <= 1.0);
    }
}
