use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server settings read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    /// JSON file with the word pairs
    pub corpus_path: PathBuf,
    pub commit_attempts: u32,
    /// Per-room broadcast buffer; slow sockets past this skip ahead
    pub broadcast_capacity: usize,
    pub room_ttl: Duration,
    pub sweep_interval: Duration,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            corpus_path: PathBuf::from("cards.json"),
            commit_attempts: crate::state::DEFAULT_COMMIT_ATTEMPTS,
            broadcast_capacity: 100,
            room_ttl: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(300),
            allowed_origins: Vec::new(),
        }
    }
}

/// Parse `key`, falling back to `default` when unset or malformed
fn env_or<T: FromStr + std::fmt::Debug>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "Ignoring invalid setting");
                default
            }
        },
        Err(_) => default,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let corpus_path = std::env::var("CORPUS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.corpus_path);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            port: env_or("PORT", defaults.port),
            corpus_path,
            commit_attempts: env_or("COMMIT_ATTEMPTS", defaults.commit_attempts).max(1),
            broadcast_capacity: env_or("BROADCAST_CAPACITY", defaults.broadcast_capacity).max(1),
            room_ttl: Duration::from_secs(env_or("ROOM_TTL_HOURS", 24u64).saturating_mul(3600)),
            sweep_interval: Duration::from_secs(env_or("SWEEP_INTERVAL_SECS", 300u64).max(1)),
            allowed_origins,
        };

        tracing::info!(
            port = config.port,
            corpus = %config.corpus_path.display(),
            commit_attempts = config.commit_attempts,
            origins = config.allowed_origins.len(),
            "Server config loaded"
        );
        config
    }
}
