// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::broker::Topic;

/// Process-wide configuration, built once at startup and handed to each
/// component constructor.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// Root directory for exported quiz artifacts.
    pub artifact_root: String,
    /// Endpoint of the real-time room service. `None` disables notifications.
    pub notification_url: Option<Url>,
    pub broker: BrokerConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_full_name: Option<String>,
}

/// Settings for the producer pool and per-topic consumers.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub group_id: String,
    pub topics: Vec<Topic>,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub max_wait: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt_secret: String,
    pub ttl: Duration,
    pub store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub leaderboard_ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            group_id: "quiz-api".to_string(),
            topics: Topic::ALL.to_vec(),
            worker_count: 10,
            queue_capacity: 100,
            max_wait: Duration::from_millis(100),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            leaderboard_ttl: Duration::from_secs(30),
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ttl: Duration::from_secs(24 * 60 * 60),
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let notification_url = env::var("NOTIFICATION_URL")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| Url::parse(&raw).expect("NOTIFICATION_URL must be a valid URL"));

        let store_timeout = Duration::from_secs(parse_or("STORE_TIMEOUT_SECS", 5));

        let broker = BrokerConfig {
            group_id: env::var("BROKER_GROUP_ID").unwrap_or_else(|_| "quiz-api".to_string()),
            topics: Topic::ALL.to_vec(),
            worker_count: parse_or("BROKER_WORKERS", 10),
            queue_capacity: parse_or("BROKER_QUEUE_CAPACITY", 100),
            max_wait: Duration::from_millis(parse_or("BROKER_MAX_WAIT_MS", 100)),
        };

        let session = SessionConfig {
            jwt_secret: jwt_secret.clone(),
            ttl: Duration::from_secs(parse_or("SESSION_TTL_SECS", 24 * 60 * 60)),
            store_timeout,
        };

        let cache = CacheConfig {
            leaderboard_ttl: Duration::from_secs(parse_or("LEADERBOARD_TTL_SECS", 30)),
            store_timeout,
        };

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            artifact_root: env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./static".to_string()),
            notification_url,
            broker,
            session,
            cache,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            admin_full_name: env::var("ADMIN_FULL_NAME").ok(),
        }
    }
}

/// Reads an optional numeric variable, falling back when unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{} is not a valid number, using default", key);
            default
        }),
        Err(_) => default,
    }
}
