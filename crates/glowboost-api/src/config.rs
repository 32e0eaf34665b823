//! Configuration types for the HTTP service
//!
//! Sources are layered with the `config` crate, later sources overriding
//! earlier ones:
//!
//! 1. `/etc/glowboost/service.yaml`
//! 2. `./config/service.yaml`
//! 3. The file named by `GB_CONFIG_FILE`
//! 4. Environment variables prefixed `GB__` with `__` as separator,
//!    e.g. `GB__SERVER__PORT=9090`
//!
//! Every field has a default, so an unconfigured environment still produces
//! a complete config. [`ServiceConfig::validate`] decides whether it is usable.

use crate::errors::ConfigError;
use glowboost_core::{Environment, Salon, SalonId, SignatureVerifier, WebhookSecret};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable naming an additional YAML config file
pub const CONFIG_FILE_ENV: &str = "GB_CONFIG_FILE";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "GB";

/// Fallback for `webhook.secret`
pub const WEBHOOK_SECRET_ENV: &str = "CAL_WEBHOOK_SECRET";

/// Fallback for `store.database_url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Service configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deployment environment
    pub environment: Environment,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook ingestion settings
    pub webhook: WebhookConfig,

    /// Booking store settings
    pub store: StoreConfig,

    /// Dashboard read API settings
    pub dashboard: DashboardConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: false,
            enable_compression: true,
        }
    }
}

/// Webhook ingestion configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Shared HMAC secret configured in Cal.com
    pub secret: Option<WebhookSecret>,

    /// Accept unsigned deliveries when no secret is configured.
    /// Rejected by validation in production.
    pub allow_unsigned: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/api/webhooks/cal".to_string(),
            secret: None,
            allow_unsigned: false,
        }
    }
}

/// Bearer token guarding the dashboard read API
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(try_from = "String")]
pub struct ApiToken(String);

impl ApiToken {
    /// Create a token, rejecting blank values
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "dashboard.api_token must not be blank".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Constant-time comparison against a presented token
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl TryFrom<String> for ApiToken {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// Dashboard read API configuration
///
/// Without a token every dashboard request is refused with 401.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_token: Option<ApiToken>,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

/// Salon provisioned at startup for the in-memory store
#[derive(Debug, Clone, Deserialize)]
pub struct SalonSeed {
    pub id: String,
    pub organizer_email: String,
}

/// Booking store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL
    pub database_url: Option<String>,

    pub max_connections: u32,

    pub acquire_timeout_seconds: u64,

    /// Apply the schema on startup
    pub run_migrations: bool,

    /// Salons to provision in the in-memory store
    pub salons: Vec<SalonSeed>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 10,
            acquire_timeout_seconds: 5,
            run_migrations: false,
            salons: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "glowboost_service=info,glowboost_api=info,glowboost_core=info,tower_http=info"
                .to_string(),
            json_format: false,
        }
    }
}

impl ServiceConfig {
    /// Load layered configuration from files and the environment
    pub fn load(explicit_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("/etc/glowboost/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name("config/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Some(path) = explicit_path.filter(|p| !p.is_empty()) {
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Fill unset values from the conventional environment variables
    pub fn apply_env_fallbacks(
        &mut self,
        webhook_secret: Option<String>,
        database_url: Option<String>,
    ) -> Result<(), ConfigError> {
        if self.webhook.secret.is_none() {
            if let Some(raw) = webhook_secret.filter(|s| !s.trim().is_empty()) {
                let secret = WebhookSecret::new(raw).map_err(|e| ConfigError::Invalid {
                    message: format!("{WEBHOOK_SECRET_ENV}: {e}"),
                })?;
                self.webhook.secret = Some(secret);
            }
        }

        if self.store.database_url.is_none() {
            self.store.database_url = database_url.filter(|s| !s.trim().is_empty());
        }

        Ok(())
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.webhook.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhook.endpoint_path must start with '/', got '{}'",
                    self.webhook.endpoint_path
                ),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        if self.webhook.secret.is_none() && !self.webhook.allow_unsigned {
            return Err(ConfigError::Missing {
                key: "webhook.secret".to_string(),
            });
        }

        if self.webhook.allow_unsigned && !self.environment.is_development() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhook.allow_unsigned is only permitted in development, not {}",
                    self.environment
                ),
            });
        }

        if self.store.backend == StoreBackend::Postgres {
            match &self.store.database_url {
                Some(url) if !url.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::Missing {
                        key: "store.database_url".to_string(),
                    })
                }
            }
            if self.store.max_connections == 0 {
                return Err(ConfigError::Invalid {
                    message: "store.max_connections must be greater than zero".to_string(),
                });
            }
        }

        self.seed_salons().map(|_| ())
    }

    /// Build the signature verifier this configuration asks for
    pub fn signature_verifier(&self) -> Result<SignatureVerifier, ConfigError> {
        match (&self.webhook.secret, self.webhook.allow_unsigned) {
            (Some(secret), _) => Ok(SignatureVerifier::enforced(secret.clone())),
            (None, true) => Ok(SignatureVerifier::disabled()),
            (None, false) => Err(ConfigError::Missing {
                key: "webhook.secret".to_string(),
            }),
        }
    }

    /// Salons to provision in the in-memory store
    pub fn seed_salons(&self) -> Result<Vec<Salon>, ConfigError> {
        self.store
            .salons
            .iter()
            .map(|seed| {
                let id = SalonId::new(seed.id.clone()).map_err(|e| ConfigError::Invalid {
                    message: format!("store.salons: {e}"),
                })?;
                if seed.organizer_email.trim().is_empty() {
                    return Err(ConfigError::Missing {
                        key: format!("store.salons[{id}].organizer_email"),
                    });
                }
                Ok(Salon::new(id, seed.organizer_email.trim()))
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
