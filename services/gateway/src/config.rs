use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `POTSPLIT__SERVER__PORT=9000`
const ENV_PREFIX: &str = "POTSPLIT";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: potsplit_sessions::Config,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    /// Defaults, then an optional `potsplit.toml`, then `POTSPLIT__*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    fn load(env: Environment) -> Result<Self, ConfigError> {
        let defaults = potsplit_sessions::Config::default();

        config::Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Session defaults
            .set_default("sessions.data_dir", defaults.data_dir.to_string_lossy().to_string())?
            .set_default("sessions.retention_hours", defaults.retention_hours)?
            .set_default("sessions.sweep_interval_secs", defaults.sweep_interval_secs)?
            .add_source(File::with_name("potsplit").required(false))
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::load(env(&[])).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.sessions.retention_hours, 24);
        assert_eq!(config.sessions.sweep_interval_secs, 3600);
        assert_eq!(config.sessions.settlement.links.note_prefix, "Poker Night Settlement");
    }

    #[test]
    fn test_environment_overrides() {
        let config = GatewayConfig::load(env(&[
            ("POTSPLIT__SERVER__PORT", "9000"),
            ("POTSPLIT__SESSIONS__DATA_DIR", "/tmp/potsplit"),
            ("POTSPLIT__SESSIONS__RETENTION_HOURS", "48"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.sessions.data_dir, std::path::PathBuf::from("/tmp/potsplit"));
        assert_eq!(config.sessions.retention_hours, 48);
    }
}
