//! Server configuration.
//!
//! Loaded from a TOML file with environment overrides (`TABLY_*`,
//! `__`-separated for nesting, e.g. `TABLY_AUTH__JWT_SECRET`).

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tably_auth::AuthConfig;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Authentication and session configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind, e.g. `0.0.0.0:8080`.
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional TOML file plus `TABLY_*`
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if
    /// the merged configuration fails validation.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path).required(false).format(config::FileFormat::Toml),
            );
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("TABLY").separator("__"))
            .build()?;

        let app_config: Self = settings.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Checks the configuration for startup-time mistakes.
    ///
    /// # Errors
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .listen
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("server.listen is not a socket address: {e}"))?;
        if self.auth.jwt_secret.trim().is_empty() {
            anyhow::bail!("auth.jwt_secret must be set");
        }
        Ok(())
    }
}
