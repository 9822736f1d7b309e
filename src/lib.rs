//! Waypoint - Code & Documentation Navigation Assistant
//!
//! Implements query-driven navigation over dual embedded corpora with:
//! - Intent classification and weight-learned component routing
//! - Budget-constrained orchestration of analysis components
//! - Deterministic report composition with alert deduplication
//! - Incremental, idempotent corpus indexing

pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod embedding;
pub mod indexer;
pub mod search;
pub mod intent;
pub mod registry;
pub mod components;
pub mod orchestrator;
pub mod compose;
pub mod feedback;
pub mod advisor;
pub mod engine;
pub mod server;

pub use types::*;
pub use error::WaypointError;
pub use config::EngineConfig;
pub use store::EntryStore;
pub use embedding::{Embedder, EmbeddingBackend, HttpEmbedder, MockEmbedder};
pub use indexer::Indexer;
pub use search::SemanticSearchEngine;
pub use intent::IntentClassifier;
pub use registry::ComponentRegistry;
pub use components::{
    AnalysisComponent, CodeLocator, DocFreshnessAuditor, DocRetriever, ModuleHealthScanner,
    ReferenceMapper,
};
pub use orchestrator::Orchestrator;
pub use compose::OutputComposer;
pub use feedback::{FeedbackLearner, LearnerConfig, WeightTable};
pub use advisor::AdvisorClient;
pub use engine::{NavEngine, SharedNavEngine};
