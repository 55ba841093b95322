use std::env;

/// Tunables for the pipeline core. Defaults match the production values;
/// env vars override individually.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// History window for novelty and cross-history dedup, in days.
    pub novelty_days: i64,
    /// Max similarity against history below which an item counts as novel.
    pub novelty_threshold: f64,
    /// Similarity above which two items are near-duplicates.
    pub duplicate_threshold: f64,
    /// Similarity at or above which items cluster into one topic group.
    pub group_threshold: f64,
    /// Synthesize only every Nth session.
    pub synthesize_interval: u32,
    /// Re-entries into enrich/summarize allowed per item before it is
    /// forwarded regardless of verdict.
    pub max_redo_cycles: u32,
    /// Dominant-tag occurrences a group must exceed to be synthesized.
    pub min_tag_count: usize,
    /// Items older than this are pruned from storage at publish time.
    pub retention_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            novelty_days: 7,
            novelty_threshold: 0.5,
            duplicate_threshold: 0.85,
            group_threshold: 0.7,
            synthesize_interval: 10,
            max_redo_cycles: 1,
            min_tag_count: 3,
            retention_days: 30,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            novelty_days: env_or("NOVELTY_DAYS", d.novelty_days),
            novelty_threshold: env_or("NOVELTY_THRESHOLD", d.novelty_threshold),
            duplicate_threshold: env_or("DUPLICATE_THRESHOLD", d.duplicate_threshold),
            group_threshold: env_or("GROUP_THRESHOLD", d.group_threshold),
            synthesize_interval: env_or("SYNTHESIZE_INTERVAL", d.synthesize_interval),
            max_redo_cycles: env_or("MAX_REDO_CYCLES", d.max_redo_cycles),
            min_tag_count: env_or("MIN_TAG_COUNT", d.min_tag_count),
            retention_days: env_or("RETENTION_DAYS", d.retention_days),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI provider (OpenAI-compatible)
    pub openai_api_key: String,
    pub openai_model: String,
    pub embedding_model: String,
    pub openai_base_url: Option<String>,

    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            openai_api_key: required_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} could not be parsed")),
        Err(_) => default,
    }
}
