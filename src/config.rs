//! Engine configuration, overridable via environment variables

use crate::types::IntentCategory;

/// Tunables for routing, orchestration and learning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-query ceiling on cumulative component estimated_cost.
    pub component_budget: u32,
    /// Per-component wall-clock budget in milliseconds.
    pub component_timeout_ms: u64,
    /// Max concurrently executing components.
    pub worker_count: usize,
    /// Index age beyond which search results are flagged stale, in seconds.
    pub staleness_window_secs: i64,
    /// Embedding backend retry attempts before surfacing EmbeddingUnavailable.
    pub embed_retries: u32,
    /// Initial retry backoff in milliseconds, doubled per attempt.
    pub embed_backoff_ms: u64,
    /// Upper clamp for learned weights.
    pub weight_cap: f32,
    /// At or below this weight a candidate is excluded unless the floor
    /// override applies.
    pub weight_floor: f32,
    /// Weight delta applied per component on a GOOD rating.
    pub delta_good: f32,
    /// Weight delta subtracted per component on a NOISY rating.
    pub delta_noisy: f32,
    /// Queries longer than this are rejected as malformed.
    pub max_query_len: usize,
    /// Capability tags that must always be represented for an intent,
    /// even when learning has decayed the sole provider to the floor.
    pub essential_capabilities: Vec<(IntentCategory, &'static str)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            component_budget: 8,
            component_timeout_ms: 2_000,
            worker_count: 4,
            staleness_window_secs: 24 * 3600,
            embed_retries: 3,
            embed_backoff_ms: 200,
            weight_cap: 2.0,
            weight_floor: 0.05,
            delta_good: 0.1,
            delta_noisy: 0.2,
            max_query_len: 2_000,
            essential_capabilities: vec![
                (IntentCategory::DocLookup, "protocol-lookup"),
                (IntentCategory::ModuleHealth, "health-scan"),
            ],
        }
    }
}

impl EngineConfig {
    /// Build from environment, falling back to defaults per field.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.component_budget = env_parse("WAYPOINT_COMPONENT_BUDGET", cfg.component_budget);
        cfg.component_timeout_ms = env_parse("WAYPOINT_COMPONENT_TIMEOUT_MS", cfg.component_timeout_ms);
        cfg.worker_count = env_parse("WAYPOINT_WORKER_COUNT", cfg.worker_count);
        cfg.staleness_window_secs = env_parse("WAYPOINT_STALENESS_SECS", cfg.staleness_window_secs);
        cfg.embed_retries = env_parse("WAYPOINT_EMBED_RETRIES", cfg.embed_retries);
        cfg.embed_backoff_ms = env_parse("WAYPOINT_EMBED_BACKOFF_MS", cfg.embed_backoff_ms);
        cfg.weight_cap = env_parse("WAYPOINT_WEIGHT_CAP", cfg.weight_cap);
        cfg.weight_floor = env_parse("WAYPOINT_WEIGHT_FLOOR", cfg.weight_floor);
        cfg.delta_good = env_parse("WAYPOINT_DELTA_GOOD", cfg.delta_good);
        cfg.delta_noisy = env_parse("WAYPOINT_DELTA_NOISY", cfg.delta_noisy);
        cfg.max_query_len = env_parse("WAYPOINT_MAX_QUERY_LEN", cfg.max_query_len);
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
