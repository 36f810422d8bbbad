use super::types::Config;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    // Expand environment variables before parsing
    let yaml_string = expand_env_vars(&yaml_string);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        ))
    })?;

    config.logs.path = expand_tilde(&config.logs.path);

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "Environment variables are not set: {}\n\
         \n\
         To fix this, either:\n\
         1. Set the variables (e.g., export LOGS_DIR=/var/log/cubes)\n\
         2. Replace them in the config file with actual values",
        unexpanded_vars.join(", ")
    )))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.web.listen.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "web.listen '{}' is not a valid address:port",
            config.web.listen
        ));
    }

    if config.cache.ttl.is_zero() {
        errors.push("cache.ttl must be greater than zero".to_string());
    }

    if config.watch.enabled && config.watch.debounce.is_zero() {
        errors.push("watch.debounce must be greater than zero".to_string());
    }

    if config.logs.path.as_os_str().is_empty() {
        errors.push("logs.path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            "logs:\n  path: /var/log/cubes\n  seed_sample: false\n\
             cache:\n  ttl: 45s\n\
             web:\n  listen: 127.0.0.1:8080\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.logs.path, Path::new("/var/log/cubes"));
        assert!(!config.logs.seed_sample);
        assert_eq!(config.cache.ttl.as_secs(), 45);
        assert_eq!(config.web.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("CUBEDASH_LOGS", "/tmp/cube-logs");
        let file = write_config("logs:\n  path: $env{CUBEDASH_LOGS}\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.logs.path, Path::new("/tmp/cube-logs"));
        std::env::remove_var("CUBEDASH_LOGS");
    }

    #[test]
    fn test_unset_env_var_is_an_error() {
        let file = write_config("logs:\n  path: $env{CUBEDASH_DEFINITELY_UNSET}\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_bad_listen_rejected() {
        let file = write_config("web:\n  listen: not-an-address\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationList(_)));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let file = write_config("cache:\n  ttl: 0s\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationList(_)));
    }
}
