use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{
    CURRENT_CONFIG_VERSION, Config, DEFAULT_HOST, DEFAULT_LOG_LEVEL, DatabaseConfig, ServerConfig,
};

pub const HOST_ENV: &str = "TASKBOARD_HOST";
pub const PORT_ENV: &str = "TASKBOARD_PORT";
pub const FALLBACK_PORT_ENV: &str = "PORT";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const LOG_LEVEL_ENV: &str = "RUST_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub fn load_config_from_file(config_path: &Path) -> Config {
    match std::fs::read_to_string(config_path) {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!(path = %config_path.display(), "No config file found, using defaults");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

pub fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let normalized = config.clone().normalized();
    let raw_config = serde_json::to_string_pretty(&normalized)?;
    std::fs::write(config_path, raw_config)?;
    Ok(())
}

impl Config {
    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from<F>(mut self, get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            get_env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(host) = get(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(raw) = get(PORT_ENV).or_else(|| get(FALLBACK_PORT_ENV)) {
            self.server.port = raw
                .parse::<u16>()
                .map_err(|_| ConfigError::ValidationError(format!("Invalid port '{raw}'")))?;
        }
        if let Some(url) = get(DATABASE_URL_ENV) {
            self.database.url = Some(url);
        }
        if let Some(level) = get(LOG_LEVEL_ENV) {
            self.log_level = level;
        }

        Ok(self.normalized())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_raw(r#"{"server": {"port": 4000}}"#);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.database.url, None);
    }

    #[test]
    fn invalid_json_falls_back_to_default() {
        assert_eq!(Config::from_raw("{not json"), Config::default());
    }

    #[test]
    fn blank_values_are_normalized_away() {
        let config = Config::from_raw(
            r#"{"configVersion": "old", "server": {"host": "  "}, "database": {"url": " "}, "logLevel": ""}"#,
        );
        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.database.url, None);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn env_overrides_win() {
        let config = Config::default()
            .with_overrides_from(env(&[
                (HOST_ENV, "0.0.0.0"),
                (FALLBACK_PORT_ENV, "8080"),
                (DATABASE_URL_ENV, "sqlite::memory:"),
                (LOG_LEVEL_ENV, "debug"),
            ]))
            .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.log_level, "debug");

        let config = Config::default()
            .with_overrides_from(env(&[(PORT_ENV, "9000"), (FALLBACK_PORT_ENV, "8080")]))
            .unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Config::default()
            .with_overrides_from(env(&[(PORT_ENV, "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("http")));
    }

    #[test]
    fn save_then_load() {
        let temp = test_support::temp_root().unwrap();
        let path = temp.path().join("config.json");
        assert_eq!(load_config_from_file(&path), Config::default());

        let mut config = Config::default();
        config.server.port = 5151;
        config.database.url = Some("sqlite://tasks.db?mode=rwc".to_string());
        save_config_to_file(&config, &path).unwrap();

        assert_eq!(load_config_from_file(&path), config);
    }
}
