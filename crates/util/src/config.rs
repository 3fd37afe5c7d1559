use std::{env, fmt, net::SocketAddr};

use super::{non_blank_var, server_bind_address, DEFAULT_DATABASE_URL};

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where repositories keep their data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local maps; everything is lost on exit.
    Memory,
    Sqlite { url: String },
}

impl StorageBackend {
    fn from_env() -> Result<Self, ConfigError> {
        let kind = non_blank_var("STORAGE_BACKEND").unwrap_or_else(|| "sqlite".to_string());
        match kind.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite {
                url: non_blank_var("DATABASE_URL")
                    .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            }),
            _ => Err(ConfigError::InvalidStorageBackend(kind)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub storage: StorageBackend,
    /// Shared secret expected in `x-api-key` on extension requests. When
    /// absent every extension request is refused.
    pub extension_api_key: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("storage", &self.storage)
            .field(
                "extension_api_key",
                &self.extension_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let storage = StorageBackend::from_env()?;
        let extension_api_key = non_blank_var("EXTENSION_API_KEY");

        Ok(Self {
            bind_addr,
            environment,
            storage,
            extension_api_key,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidStorageBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidStorageBackend(value) => write!(
                f,
                "STORAGE_BACKEND must be 'memory' or 'sqlite' (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_BIND_ADDR, ENV_GUARD};

    const VARS: [&str; 5] = [
        "APP_ENV",
        "APP_BIND_ADDR",
        "STORAGE_BACKEND",
        "DATABASE_URL",
        "EXTENSION_API_KEY",
    ];

    fn clear() {
        for name in VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(
            config.storage,
            StorageBackend::Sqlite {
                url: DEFAULT_DATABASE_URL.to_string()
            }
        );
        assert_eq!(config.extension_api_key, None);
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear();
    }

    #[test]
    fn parses_production_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("STORAGE_BACKEND", "Memory");
        env::set_var("EXTENSION_API_KEY", "s3cret");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.extension_api_key.as_deref(), Some("s3cret"));
        assert!(!format!("{config:?}").contains("s3cret"));

        clear();
    }

    #[test]
    fn rejects_unknown_storage_backend() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear();
        env::set_var("STORAGE_BACKEND", "postgres");

        let err = AppConfig::from_env().expect_err("unknown backend should error");
        assert_eq!(
            err.to_string(),
            "STORAGE_BACKEND must be 'memory' or 'sqlite' (got postgres)"
        );

        clear();
    }

    #[test]
    fn custom_database_url_is_used() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear();
        env::set_var("DATABASE_URL", "sqlite:///var/lib/jobtrack/data.db");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(
            config.storage,
            StorageBackend::Sqlite {
                url: "sqlite:///var/lib/jobtrack/data.db".to_string()
            }
        );

        clear();
    }
}
