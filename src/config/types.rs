use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration. Every section has defaults, so an empty YAML
/// document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub web: WebConfig,
}

/// Where the batch-search run logs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    #[serde(default = "default_logs_path")]
    pub path: PathBuf,

    /// Seed a sample run log when the directory is created empty, so a
    /// fresh install has something to show.
    #[serde(default = "default_true")]
    pub seed_sample: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            path: default_logs_path(),
            seed_sample: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a directory snapshot stays fresh (e.g. "30s", "2m").
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period after a change before the caches are invalidated.
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: default_debounce(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    /// Address:port the HTTP server binds.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_logs_path() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_debounce() -> Duration {
    Duration::from_secs(1)
}

fn default_listen() -> String {
    "0.0.0.0:3001".to_string()
}
