//! Configuration management for the PDF handler

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_RETENTION_DAYS;
use crate::document::DEFAULT_TEXT_CACHE_PAGES;
use crate::search::DEFAULT_EXCERPT_CONTEXT;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory holding cached documents
    pub dir: PathBuf,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Pages whose extracted text stays in memory per document
    pub text_cache_pages: usize,
    /// Chars of context on either side of a match excerpt
    pub excerpt_context: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

fn default_cache_dir() -> PathBuf {
    env::temp_dir().join("pdfhandler-cache")
}

fn default_user_agent() -> String {
    format!("pdfhandler/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache: CacheConfig {
                dir: default_cache_dir(),
                retention_days: DEFAULT_RETENTION_DAYS,
            },
            fetch: FetchConfig {
                user_agent: default_user_agent(),
            },
            search: SearchConfig {
                text_cache_pages: DEFAULT_TEXT_CACHE_PAGES,
                excerpt_context: DEFAULT_EXCERPT_CONTEXT,
            },
        }
    }
}

impl Config {
    /// Read configuration from `PDFHANDLER_*` environment variables
    ///
    /// Unset variables take their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let retention_days = parse_var("PDFHANDLER_CACHE_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        if retention_days < 0 {
            return Err(ConfigError::InvalidValue {
                name: "PDFHANDLER_CACHE_RETENTION_DAYS",
                value: retention_days.to_string(),
            });
        }

        Ok(Config {
            cache: CacheConfig {
                dir: env::var("PDFHANDLER_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_cache_dir()),
                retention_days,
            },
            fetch: FetchConfig {
                user_agent: env::var("PDFHANDLER_USER_AGENT")
                    .unwrap_or_else(|_| default_user_agent()),
            },
            search: SearchConfig {
                text_cache_pages: parse_var("PDFHANDLER_TEXT_CACHE_PAGES", DEFAULT_TEXT_CACHE_PAGES)?,
                excerpt_context: parse_var("PDFHANDLER_EXCERPT_CONTEXT", DEFAULT_EXCERPT_CONTEXT)?,
            },
        })
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache.retention_days)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
