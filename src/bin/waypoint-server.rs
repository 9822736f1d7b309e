//! Waypoint server and one-shot query binary
//!
//! `waypoint-server` serves HTTP; `waypoint-server query <text>` answers one
//! query on stdout and exits. Exit code 0 covers any completed report, even
//! a degraded one; non-zero means total backend unavailability.

use std::path::PathBuf;
use std::sync::Arc;

use waypoint::feedback::LearnerConfig;
use waypoint::indexer::now_secs;
use waypoint::{
    AdvisorClient, CodeLocator, ComponentRegistry, Corpus, DocFreshnessAuditor, DocRetriever,
    Embedder, EngineConfig, Entry, EntryMetadata, EntryStore, EntryType, FeedbackLearner,
    FeedbackRating, FeedbackRecord, HttpEmbedder, Indexer, MockEmbedder, ModuleHealthScanner,
    NavEngine, Query, QueryFilters, ReferenceMapper, SemanticSearchEngine, SharedNavEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    println!("Waypoint Navigation Assistant");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = EngineConfig::from_env();
    let use_real = args.iter().any(|a| a == "--use-real");

    let state_dir = std::env::var("WAYPOINT_STATE_DIR").unwrap_or_else(|_| ".waypoint".to_string());
    let state_dir = PathBuf::from(state_dir);
    std::fs::create_dir_all(&state_dir)?;

    let roots: Vec<PathBuf> = std::env::var("WAYPOINT_CORPUS_ROOTS")
        .unwrap_or_default()
        .split(':')
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect();

    let (engine, indexer) = build_engine(&config, use_real, &state_dir, roots.clone()).await?;

    // Index once at startup when roots are configured, then keep rescanning
    // in the background without blocking query traffic.
    if let Some(indexer) = indexer {
        let stats = indexer.run_pass().await?;
        println!(
            "Indexed corpus roots: {} scanned, {} written",
            stats.scanned, stats.written
        );
        let rescan_secs: u64 = std::env::var("WAYPOINT_RESCAN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        if rescan_secs > 0 {
            indexer.spawn_background(rescan_secs);
        }
    }

    if let Some(pos) = args.iter().position(|a| a == "query") {
        let flags = &args[pos + 1..];
        return one_shot_query(engine, flags).await;
    }

    let port: u16 = std::env::var("WAYPOINT_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8085);

    println!("Engine initialized");
    println!("Starting HTTP server on port {}...", port);
    println!();

    waypoint::server::run_server(engine, port).await?;

    Ok(())
}

async fn build_engine(
    config: &EngineConfig,
    use_real: bool,
    state_dir: &PathBuf,
    roots: Vec<PathBuf>,
) -> anyhow::Result<(SharedNavEngine, Option<Arc<Indexer>>)> {
    let embedder = if use_real {
        println!("Mode: REAL embedding backend");
        let embed_url = std::env::var("EMBEDDING_SERVICE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8083".to_string());
        println!("Embedding service: {}", embed_url);

        let backend = HttpEmbedder::new(embed_url.clone());
        match backend.health_check().await {
            Ok(true) => println!("Embedding service is healthy"),
            Ok(false) => eprintln!("Warning: embedding service reported unhealthy"),
            Err(e) => {
                eprintln!("Failed to connect to embedding service: {}", e);
                eprintln!("   Set EMBEDDING_SERVICE_URL or start the backend");
                return Err(e);
            }
        }
        Arc::new(Embedder::new(
            Arc::new(backend),
            config.embed_retries,
            config.embed_backoff_ms,
        ))
    } else {
        println!("Mode: MOCK embedding backend");
        println!("   (use --use-real to enable the HTTP embedding service)");
        Arc::new(Embedder::new(
            Arc::new(MockEmbedder::new()),
            config.embed_retries,
            config.embed_backoff_ms,
        ))
    };

    let store = Arc::new(EntryStore::open(state_dir.join("entries.json"))?);
    if !use_real && store.count(Corpus::Code).await == 0 && roots.is_empty() {
        seed_demo_corpus(&store, &embedder).await?;
        store.set_last_built(now_secs()).await?;
        println!("Seeded demo corpus");
    }

    let learner = Arc::new(FeedbackLearner::open(
        state_dir,
        LearnerConfig {
            delta_good: config.delta_good,
            delta_noisy: config.delta_noisy,
            weight_cap: config.weight_cap,
        },
    )?);

    let advisor = std::env::var("ADVISOR_SERVICE_URL").ok().map(|url| {
        println!("Advisor enabled: {}", url);
        AdvisorClient::new(url)
    });

    let search = SemanticSearchEngine::new(
        store.clone(),
        embedder.clone(),
        config.staleness_window_secs,
    );
    let registry = ComponentRegistry::new(vec![
        Arc::new(DocRetriever),
        Arc::new(CodeLocator::new(roots.clone())),
        Arc::new(ModuleHealthScanner),
        Arc::new(DocFreshnessAuditor),
        Arc::new(ReferenceMapper),
    ]);

    let engine = NavEngine::new(search, registry, learner, advisor, config.clone());

    let indexer = if roots.is_empty() {
        None
    } else {
        Some(Arc::new(Indexer::new(store, embedder, roots)))
    };

    Ok((engine, indexer))
}

/// Answer a single query from the command line: flags are --limit N,
/// --corpus code|doc and --rating good|noisy|missing.
async fn one_shot_query(engine: SharedNavEngine, flags: &[String]) -> anyhow::Result<()> {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut limit: Option<usize> = None;
    let mut corpus: Option<Corpus> = None;
    let mut rating: Option<FeedbackRating> = None;

    let mut i = 0;
    while i < flags.len() {
        match flags[i].as_str() {
            "--limit" => {
                i += 1;
                limit = flags.get(i).and_then(|v| v.parse().ok());
            }
            "--corpus" => {
                i += 1;
                corpus = match flags.get(i).map(|s| s.as_str()) {
                    Some("code") => Some(Corpus::Code),
                    Some("doc") | Some("docs") => Some(Corpus::Document),
                    other => {
                        eprintln!("Unknown corpus filter: {:?}", other);
                        None
                    }
                };
            }
            "--rating" => {
                i += 1;
                rating = flags.get(i).and_then(|v| FeedbackRating::parse(v));
            }
            word => text_parts.push(word),
        }
        i += 1;
    }

    let mut query = Query::new(text_parts.join(" "));
    if let Some(limit) = limit {
        query.limit = limit.clamp(1, 50);
    }
    query.filters = QueryFilters {
        entry_type: None,
        corpus,
    };
    let query_text = query.text.clone();

    let outcome = engine.answer(query).await?;
    println!("{}", outcome.report.text);

    if let Some(rating) = rating {
        let components_used: Vec<String> = outcome
            .decisions
            .iter()
            .filter(|d| d.included)
            .map(|d| d.component_name.clone())
            .collect();
        engine
            .record_feedback(FeedbackRecord {
                query_text,
                intent_category: outcome.report.intent.category,
                components_used,
                rating,
                timestamp: now_secs(),
            })
            .await?;
        println!("Feedback recorded: {:?}", rating);
    }

    Ok(())
}

/// Small built-in corpus so mock mode answers something out of the box.
async fn seed_demo_corpus(store: &Arc<EntryStore>, embedder: &Arc<Embedder>) -> anyhow::Result<()> {
    let units = [
        (
            Corpus::Code,
            "engine/pipeline.rs",
            "pub fn answer(query) -> report: search classify route orchestrate compose",
            EntryType::Other,
            8,
        ),
        (
            Corpus::Code,
            "engine/router.rs",
            "weight table routing with budget and floor override for components",
            EntryType::Other,
            6,
        ),
        (
            Corpus::Document,
            "docs/README.md",
            "overview of the navigation assistant and how to use queries",
            EntryType::ModuleReadme,
            8,
        ),
        (
            Corpus::Document,
            "docs/wire-protocol.md",
            "protocol documentation for the query and feedback endpoints",
            EntryType::ProtocolDoc,
            7,
        ),
    ];

    let now = now_secs();
    let mut entries = Vec::new();
    for (corpus, path, text, entry_type, priority) in units {
        let embedding = embedder.embed(text).await?;
        entries.push(Entry {
            id: path.to_string(),
            corpus,
            text: text.to_string(),
            embedding,
            metadata: EntryMetadata {
                path: path.to_string(),
                entry_type,
                priority,
                module_owner: path.rsplit_once('/').map(|(d, _)| d.to_string()),
                last_modified: now,
                content_hash: blake3::hash(text.as_bytes()).to_hex().to_string(),
            },
        });
    }
    store.upsert(entries).await?;
    Ok(())
}
