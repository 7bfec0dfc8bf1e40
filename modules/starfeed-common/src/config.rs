use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Recommendation store
    pub gorse_endpoint: String,
    pub gorse_api_key: String,

    // Identity table
    pub database_url: String,

    // Source API credential for maintenance jobs (per-identity tokens
    // come from the identity table, not from here)
    pub github_token: Option<String>,

    // Enrichment policy
    pub min_stars: u32,
    pub min_label_freq: usize,
    pub max_comment_len: usize,
    pub max_items_per_sync: usize,

    // Scheduling
    pub resync_interval_hours: i64,
    pub sync_concurrency: usize,
}

impl Config {
    /// Load configuration for the sync scheduler.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            gorse_endpoint: required_env("GORSE_ENDPOINT"),
            gorse_api_key: env::var("GORSE_API_KEY").unwrap_or_default(),
            database_url: required_env("DATABASE_URL"),
            github_token: env::var("GITHUB_TOKEN").ok(),
            min_stars: parse_env("MIN_STARS", 100),
            min_label_freq: parse_env("MIN_LABEL_FREQ", 5),
            max_comment_len: parse_env("MAX_COMMENT_LEN", 512),
            max_items_per_sync: parse_env("MAX_ITEMS_PER_SYNC", 100),
            resync_interval_hours: parse_env("RESYNC_INTERVAL_HOURS", 24),
            sync_concurrency: parse_env("SYNC_CONCURRENCY", 5),
        }
    }

    /// Load a minimal config for maintenance jobs (no identity table).
    pub fn jobs_from_env() -> Self {
        Self {
            gorse_endpoint: required_env("GORSE_ENDPOINT"),
            gorse_api_key: env::var("GORSE_API_KEY").unwrap_or_default(),
            database_url: String::new(),
            github_token: env::var("GITHUB_TOKEN").ok(),
            min_stars: parse_env("MIN_STARS", 100),
            min_label_freq: parse_env("MIN_LABEL_FREQ", 5),
            max_comment_len: parse_env("MAX_COMMENT_LEN", 512),
            max_items_per_sync: parse_env("MAX_ITEMS_PER_SYNC", 100),
            resync_interval_hours: parse_env("RESYNC_INTERVAL_HOURS", 24),
            sync_concurrency: parse_env("SYNC_CONCURRENCY", 5),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
