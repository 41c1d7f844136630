//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Consensus engine configuration.
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT settings as read from configuration sources.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for verifying tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Consensus engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// Run the duplicate sweep for a scope before recomputing its validity.
    #[serde(default = "default_suppress_duplicates")]
    pub suppress_duplicates_before_recompute: bool,
    /// Maximum number of ids per `UPDATE ... WHERE id IN (...)` statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            suppress_duplicates_before_recompute: default_suppress_duplicates(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_suppress_duplicates() -> bool {
    true
}

fn default_batch_size() -> usize {
    500
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LABELVAULT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment_applies_defaults() {
        temp_env::with_vars(
            [
                ("LABELVAULT__DATABASE__URL", Some("postgres://localhost/labelvault")),
                ("LABELVAULT__JWT__SECRET", Some("secret")),
                ("LABELVAULT__SERVER__PORT", Some("9090")),
            ],
            || {
                let config = AppConfig::load().unwrap();

                assert_eq!(config.database.url, "postgres://localhost/labelvault");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.server.host, "0.0.0.0");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.jwt.access_token_expiry_secs, 900);
                assert!(config.consensus.suppress_duplicates_before_recompute);
                assert_eq!(config.consensus.batch_size, 500);
            },
        );
    }

    #[test]
    fn test_consensus_section_overrides() {
        temp_env::with_vars(
            [
                ("LABELVAULT__DATABASE__URL", Some("postgres://localhost/labelvault")),
                ("LABELVAULT__JWT__SECRET", Some("secret")),
                ("LABELVAULT__SERVER__PORT", Some("8080")),
                (
                    "LABELVAULT__CONSENSUS__SUPPRESS_DUPLICATES_BEFORE_RECOMPUTE",
                    Some("false"),
                ),
                ("LABELVAULT__CONSENSUS__BATCH_SIZE", Some("50")),
            ],
            || {
                let config = AppConfig::load().unwrap();

                assert!(!config.consensus.suppress_duplicates_before_recompute);
                assert_eq!(config.consensus.batch_size, 50);
            },
        );
    }
}
