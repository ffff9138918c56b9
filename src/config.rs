use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as URL: {source}")]
    ParseUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

/// A watched forum thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumTopic {
    /// Display name, used in menus and logs.
    pub name: String,
    /// Thread path relative to the forum base URL, e.g. `threads/espresso.19308`.
    pub path: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub forum_base_url: Url,
    pub topics: Vec<ForumTopic>,
    pub fetch_timeout: Duration,

    // Window / newsletter
    pub photo_count: usize,
    pub newsletter_interval: Duration,

    // Storage
    pub database_path: PathBuf,
    pub work_dir: PathBuf,

    // Telegram
    pub telegram_token: String,
    pub telegram_api_base: String,
}

/// Default watched threads on kaffee-netz.de.
const DEFAULT_TOPICS: &str = "Kaffee-Ecken=threads/wie-sieht-eure-kaffee-ecke-aus.13966;\
                              Kaffeekram=threads/der-ich-habe-gerade-kaffeekram-gekauft-thread.62180;\
                              Latte-Art=threads/und-ploetzlich-war-da-latte-art.7785;\
                              Espresso=threads/ich-trinke-gerade-diesen-espresso.19308";

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = env_or_default("FORUM_BASE_URL", "https://www.kaffee-netz.de");
        let forum_base_url = Url::parse(&base).map_err(|e| ConfigError::ParseUrl {
            name: "FORUM_BASE_URL".to_string(),
            source: e,
        })?;

        Ok(Self {
            forum_base_url,
            topics: parse_topics(&env_or_default("FORUM_TOPICS", DEFAULT_TOPICS))?,
            fetch_timeout: Duration::from_secs(parse_env_u64("FETCH_TIMEOUT_SECS", 30)?),

            photo_count: parse_env_usize("PHOTO_CNT", 2)?,
            newsletter_interval: Duration::from_secs(parse_env_u64(
                "NEWSLETTER_INTERVAL_SECS",
                3600,
            )?),

            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/courier.sqlite")),
            work_dir: PathBuf::from(env_or_default("WORK_DIR", "./data/tmp")),

            telegram_token: required_env("TELEGRAM_BOT_TOKEN")?,
            telegram_api_base: env_or_default("TELEGRAM_API_BASE", "https://api.telegram.org"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forum_base_url.host_str().is_none() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_BASE_URL".to_string(),
                message: "must have a host".to_string(),
            });
        }
        if self.topics.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_TOPICS".to_string(),
                message: "at least one topic is required".to_string(),
            });
        }
        if self.photo_count == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PHOTO_CNT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.telegram_token.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "TELEGRAM_BOT_TOKEN".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// A fixed configuration for tests; override fields with struct update syntax.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            forum_base_url: Url::parse("http://forum.test").expect("static URL"),
            topics: vec![ForumTopic {
                name: "Test".to_string(),
                path: "threads/test-topic.1".to_string(),
            }],
            fetch_timeout: Duration::from_secs(5),
            photo_count: 2,
            newsletter_interval: Duration::from_secs(3600),
            database_path: PathBuf::from("./test.sqlite"),
            work_dir: PathBuf::from("./data/tmp"),
            telegram_token: "000:TEST".to_string(),
            telegram_api_base: "http://telegram.test".to_string(),
        }
    }
}

/// Parse a `name=path` list separated by semicolons into topics.
fn parse_topics(value: &str) -> Result<Vec<ForumTopic>, ConfigError> {
    let mut topics = Vec::new();

    for entry in value.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((name, path)) = entry.split_once('=') else {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_TOPICS".to_string(),
                message: format!("entry '{entry}' is not of the form name=path"),
            });
        };
        let name = name.trim();
        let path = path.trim().trim_matches('/');
        if name.is_empty() || path.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_TOPICS".to_string(),
                message: format!("entry '{entry}' has an empty name or path"),
            });
        }
        topics.push(ForumTopic {
            name: name.to_string(),
            path: path.to_string(),
        });
    }

    Ok(topics)
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
