use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::MegatickError;

/// Where persisted nodes and edges go.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Neo4j {
        uri: String,
        user: String,
        password: String,
    },
    /// Flat-file fallback: one JSON line per upsert.
    Jsonl { path: PathBuf },
}

/// What a bounded queue does when it is full. Pushing never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued item and accept the new one.
    #[default]
    DropOldest,
    /// Refuse the new item.
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = MegatickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" | "dropoldest" => Ok(OverflowPolicy::DropOldest),
            "reject" => Ok(OverflowPolicy::Reject),
            other => Err(MegatickError::Config(format!(
                "unknown queue overflow policy '{other}' (expected drop-oldest or reject)"
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropOldest => f.write_str("drop-oldest"),
            OverflowPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,

    // Notability
    /// Accepted language codes. None accepts every language.
    pub languages: Option<Vec<String>>,
    pub author_blacklist_path: Option<PathBuf>,
    pub keyword_blacklist_path: Option<PathBuf>,

    // Citation scraping
    pub domain_blacklist_path: Option<PathBuf>,
    pub scraper_workers: usize,
    /// Hosts that serve the platform's own content; pages resolving there are not scraped.
    pub platform_hosts: Vec<String>,
    pub feeds_path: Option<PathBuf>,
    pub feed_interval: Duration,

    // Thread resolution
    pub lookup_interval: Duration,
    pub twitter_bearer_token: Option<String>,

    // Queues
    pub queue_capacity: Option<usize>,
    pub queue_overflow: OverflowPolicy,

    // Stream boundary
    pub reconnect_delay: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Jsonl {
                path: PathBuf::from("megatick.jsonl"),
            },
            languages: Some(vec!["en".to_string()]),
            author_blacklist_path: None,
            keyword_blacklist_path: None,
            domain_blacklist_path: None,
            scraper_workers: 4,
            platform_hosts: vec![
                "twitter.com".to_string(),
                "mobile.twitter.com".to_string(),
                "x.com".to_string(),
            ],
            feeds_path: None,
            feed_interval: Duration::from_secs(3600),
            lookup_interval: Duration::from_millis(1000),
            twitter_bearer_token: None,
            queue_capacity: None,
            queue_overflow: OverflowPolicy::DropOldest,
            reconnect_delay: Duration::from_secs(10),
            rate_limit_backoff: Duration::from_secs(15 * 60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, MegatickError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MegatickError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                MegatickError::Config(format!("{key} environment variable is required"))
            })
        };

        let backend = match get("MEGATICK_BACKEND").as_deref().unwrap_or("neo4j") {
            "neo4j" => Backend::Neo4j {
                uri: required("NEO4J_URI")?,
                user: required("NEO4J_USER")?,
                password: required("NEO4J_PASSWORD")?,
            },
            "jsonl" => Backend::Jsonl {
                path: get("MEGATICK_JSONL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("megatick.jsonl")),
            },
            other => {
                return Err(MegatickError::Config(format!(
                    "MEGATICK_BACKEND must be neo4j or jsonl, got '{other}'"
                )))
            }
        };

        let languages = match get("MEGATICK_LANGUAGES") {
            None => defaults.languages,
            Some(v) if v.trim() == "*" => None,
            Some(v) => Some(split_list(&v)),
        };

        let scraper_workers: usize = parse_or(&get, "MEGATICK_SCRAPER_WORKERS", defaults.scraper_workers)?;
        if scraper_workers == 0 {
            return Err(MegatickError::Config(
                "MEGATICK_SCRAPER_WORKERS must be at least 1".to_string(),
            ));
        }

        let queue_capacity = match get("MEGATICK_QUEUE_CAPACITY") {
            None => None,
            Some(v) => Some(v.trim().parse::<usize>().map_err(|_| {
                MegatickError::Config(format!("MEGATICK_QUEUE_CAPACITY must be a number, got '{v}'"))
            })?),
        };
        if queue_capacity == Some(0) {
            return Err(MegatickError::Config(
                "MEGATICK_QUEUE_CAPACITY must be at least 1 (unset it for unbounded queues)"
                    .to_string(),
            ));
        }

        Ok(Self {
            backend,
            languages,
            author_blacklist_path: get("MEGATICK_AUTHOR_BLACKLIST").map(PathBuf::from),
            keyword_blacklist_path: get("MEGATICK_KEYWORD_BLACKLIST").map(PathBuf::from),
            domain_blacklist_path: get("MEGATICK_DOMAIN_BLACKLIST").map(PathBuf::from),
            scraper_workers,
            platform_hosts: get("MEGATICK_PLATFORM_HOSTS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.platform_hosts),
            feeds_path: get("MEGATICK_FEEDS").map(PathBuf::from),
            feed_interval: Duration::from_secs(parse_or(
                &get,
                "MEGATICK_FEED_INTERVAL_SECS",
                defaults.feed_interval.as_secs(),
            )?),
            lookup_interval: Duration::from_millis(parse_or(
                &get,
                "MEGATICK_LOOKUP_INTERVAL_MS",
                defaults.lookup_interval.as_millis() as u64,
            )?),
            twitter_bearer_token: get("TWITTER_BEARER_TOKEN"),
            queue_capacity,
            queue_overflow: match get("MEGATICK_QUEUE_OVERFLOW") {
                Some(v) => v.parse()?,
                None => defaults.queue_overflow,
            },
            reconnect_delay: Duration::from_secs(parse_or(
                &get,
                "MEGATICK_RECONNECT_DELAY_SECS",
                defaults.reconnect_delay.as_secs(),
            )?),
            rate_limit_backoff: defaults.rate_limit_backoff,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        let backend = match &self.backend {
            Backend::Neo4j { uri, user, .. } => format!("neo4j {user}@{uri}"),
            Backend::Jsonl { path } => format!("jsonl {}", path.display()),
        };
        let token = if self.twitter_bearer_token.is_some() {
            "[set]"
        } else {
            "[unset]"
        };
        info!(
            backend = backend.as_str(),
            languages = ?self.languages,
            author_blacklist = ?self.author_blacklist_path,
            keyword_blacklist = ?self.keyword_blacklist_path,
            domain_blacklist = ?self.domain_blacklist_path,
            scraper_workers = self.scraper_workers,
            lookup_interval_ms = self.lookup_interval.as_millis() as u64,
            twitter_bearer_token = token,
            queue_capacity = ?self.queue_capacity,
            queue_overflow = %self.queue_overflow,
            feeds = ?self.feeds_path,
            "Configuration loaded"
        );
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, MegatickError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| MegatickError::Config(format!("{key} must be a number, got '{v}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn neo4j_backend_requires_credentials() {
        let err = Config::from_lookup(lookup(&[("NEO4J_URI", "bolt://x")])).unwrap_err();
        assert!(err.to_string().contains("NEO4J_USER"));
    }

    #[test]
    fn jsonl_backend_with_defaults() {
        let config = Config::from_lookup(lookup(&[("MEGATICK_BACKEND", "jsonl")])).unwrap();
        assert_eq!(
            config.backend,
            Backend::Jsonl {
                path: PathBuf::from("megatick.jsonl")
            }
        );
        assert_eq!(config.languages, Some(vec!["en".to_string()]));
        assert_eq!(config.scraper_workers, 4);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.lookup_interval, Duration::from_millis(1000));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("MEGATICK_BACKEND", "jsonl"),
            ("MEGATICK_LANGUAGES", "en, de"),
            ("MEGATICK_SCRAPER_WORKERS", "8"),
            ("MEGATICK_LOOKUP_INTERVAL_MS", "250"),
            ("MEGATICK_QUEUE_CAPACITY", "1000"),
            ("MEGATICK_QUEUE_OVERFLOW", "reject"),
        ]))
        .unwrap();
        assert_eq!(config.languages, Some(vec!["en".to_string(), "de".to_string()]));
        assert_eq!(config.scraper_workers, 8);
        assert_eq!(config.lookup_interval, Duration::from_millis(250));
        assert_eq!(config.queue_capacity, Some(1000));
        assert_eq!(config.queue_overflow, OverflowPolicy::Reject);
    }

    #[test]
    fn wildcard_language_accepts_everything() {
        let config = Config::from_lookup(lookup(&[
            ("MEGATICK_BACKEND", "jsonl"),
            ("MEGATICK_LANGUAGES", "*"),
        ]))
        .unwrap();
        assert!(config.languages.is_none());
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = Config::from_lookup(lookup(&[
            ("MEGATICK_BACKEND", "jsonl"),
            ("MEGATICK_SCRAPER_WORKERS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MegatickError::Config(_)));

        let err = Config::from_lookup(lookup(&[
            ("MEGATICK_BACKEND", "jsonl"),
            ("MEGATICK_SCRAPER_WORKERS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MegatickError::Config(_)));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("MEGATICK_BACKEND", "jsonl"),
            ("MEGATICK_QUEUE_CAPACITY", "0"),
            ("MEGATICK_QUEUE_OVERFLOW", "reject"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MegatickError::Config(_)));
        assert!(err.to_string().contains("MEGATICK_QUEUE_CAPACITY"));
    }
}
