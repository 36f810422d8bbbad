pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CUBEDASH CONFIGURATION
# =============================================================================
# This file configures the dashboard backend: where the batch-search run logs
# live, how long directory snapshots are cached, and the HTTP listen address.
#
# Every section is optional; an empty file runs with the defaults shown below.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/cubedash/config.yml
#   3. /etc/cubedash/config.yml

# =============================================================================
# LOGS
# =============================================================================
# Directory containing run_<range>.log files produced by the batch search.
# Supports ~ and $env{VAR} expansion. When the directory does not exist it is
# created; with seed_sample enabled, a sample run log is written into it so a
# fresh install has something to show.

logs:
  path: ./logs
  seed_sample: true

# =============================================================================
# CACHE
# =============================================================================
# Parsed batches and solutions are served from an in-memory snapshot of the
# directory. ttl controls how long a snapshot stays fresh before the next
# request triggers a re-scan. Uploads and watcher events invalidate early.

cache:
  ttl: 30s

# =============================================================================
# WATCH
# =============================================================================
# Filesystem watcher on the log directory. Changes to .log files invalidate
# the cache after the debounce quiet period.

watch:
  enabled: true
  debounce: 1s

# =============================================================================
# WEB
# =============================================================================
# HTTP API listen address.

web:
  listen: 0.0.0.0:3001
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Config;

    #[test]
    fn test_starter_config_parses_to_defaults() {
        let yaml = generate_starter_config();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        let defaults = Config::default();
        assert_eq!(config.logs.path, defaults.logs.path);
        assert_eq!(config.cache.ttl, defaults.cache.ttl);
        assert_eq!(config.watch.debounce, defaults.watch.debounce);
        assert_eq!(config.web.listen, defaults.web.listen);
    }
}
