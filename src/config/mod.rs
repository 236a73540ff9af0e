use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::StorageBackend;

/// Prefix of every environment variable read by this service
pub const ENV_PREFIX: &str = "LOCATION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Environment variable missing: {name}")]
    MissingEnvironmentVariable { name: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_locations_table")]
    pub locations_table_name: String,
    #[serde(default = "default_members_table")]
    pub members_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,
    #[serde(default)]
    pub auto_create_tables: bool,
}

/// Token verification settings; the secret comes from the environment or Parameter Store
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub jwt_secret_parameter: Option<String>,
    #[serde(default = "default_jwt_leeway")]
    pub jwt_leeway_seconds: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_secret_parameter", &self.jwt_secret_parameter)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Deserialize one config section from `LOCATION_*` environment variables
fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let auth = AuthConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()))
            .load()
            .await;

        let parameter_store = Arc::new(ParameterStoreConfig::new(
            SsmClient::new(&aws_config),
            Duration::from_secs(5 * 60),
        ));

        let aws = AwsConfig {
            region: database.region.clone(),
            dynamodb_client: DynamoDbClient::new(&aws_config),
            parameter_store,
        };

        let config = Config {
            server,
            database,
            auth,
            aws,
            observability,
        };

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate()?;
        Ok(())
    }

    /// Resolve the token signing secret, consulting Parameter Store when no inline secret is set
    pub async fn jwt_secret(&self) -> Result<String, ConfigError> {
        self.auth.resolve_secret(&self.aws.parameter_store).await
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_section("server")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Request timeout cannot be 0".to_string(),
            });
        }

        if self.max_request_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "Max request size cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_section("database")
    }

    pub fn backend(&self) -> Result<StorageBackend, ConfigError> {
        self.storage_backend
            .parse()
            .map_err(|message| ConfigError::ValidationError { message })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let backend = self.backend()?;

        if backend == StorageBackend::DynamoDb {
            if self.locations_table_name.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "Locations table name cannot be empty".to_string(),
                });
            }

            if self.members_table_name.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "Members table name cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_section("auth")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let has_secret = self.jwt_secret.as_deref().is_some_and(|s| !s.is_empty());
        let has_parameter = self
            .jwt_secret_parameter
            .as_deref()
            .is_some_and(|p| !p.is_empty());

        if !has_secret && !has_parameter {
            return Err(ConfigError::MissingEnvironmentVariable {
                name: format!("{}_JWT_SECRET or {}_JWT_SECRET_PARAMETER", ENV_PREFIX, ENV_PREFIX),
            });
        }

        Ok(())
    }

    pub async fn resolve_secret(
        &self,
        parameter_store: &ParameterStoreConfig,
    ) -> Result<String, ConfigError> {
        if let Some(secret) = self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            return Ok(secret.to_string());
        }

        match self.jwt_secret_parameter.as_deref() {
            Some(name) if !name.is_empty() => parameter_store.get_parameter(name).await,
            _ => Err(ConfigError::MissingEnvironmentVariable {
                name: format!("{}_JWT_SECRET", ENV_PREFIX),
            }),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_section("observability")
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        {
            let cache = self.cache.read().await;
            if let Some((value, timestamp)) = cache.get(name) {
                if timestamp.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
            }
        }

        debug!("Fetching parameter from AWS SSM: {}", name);
        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        self.cache
            .write()
            .await
            .insert(name.to_string(), (value.clone(), Instant::now()));

        Ok(value)
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    64 * 1024
}

pub(crate) fn default_locations_table() -> String {
    "CurrentLocations".to_string()
}

pub(crate) fn default_members_table() -> String {
    "Members".to_string()
}

pub(crate) fn default_region() -> String {
    "ap-northeast-2".to_string()
}

pub(crate) fn default_storage_backend() -> String {
    StorageBackend::DynamoDb.to_string()
}

pub(crate) fn default_jwt_leeway() -> u64 {
    30
}

pub(crate) fn default_service_name() -> String {
    "current-location-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
