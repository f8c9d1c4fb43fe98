//! RELX Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Label;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Prediction pipeline configuration
    pub pipeline: PipelineConfig,

    /// Persisted model artifacts
    pub model: ModelConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Deployment configuration
    pub deploy: DeployConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Overwrite every field that has an environment variable set
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Pipeline
        if let Ok(value) = std::env::var("RELX_PARALLELISM") {
            self.pipeline.parallelism = parse_env("RELX_PARALLELISM", value)?;
        }
        if let Ok(value) = std::env::var("RELX_SPLIT") {
            self.pipeline.split = parse_env("RELX_SPLIT", value)?;
        }
        if let Ok(value) = std::env::var("RELX_THRESHOLD") {
            self.pipeline.threshold = parse_env("RELX_THRESHOLD", value)?;
        }
        if let Ok(value) = std::env::var("RELX_POSITIVE_LABEL") {
            self.pipeline.positive_label = value.parse()?;
        }
        if let Ok(path) = std::env::var("RELX_SCHEMA") {
            self.pipeline.schema_path = Some(PathBuf::from(path));
        }
        if let Ok(class) = std::env::var("RELX_CANDIDATE_CLASS") {
            self.pipeline.candidate_class = Some(class);
        }

        // Model artifacts
        if let Ok(path) = std::env::var("RELX_CHECKPOINT") {
            self.model.checkpoint_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("RELX_VOCABULARY") {
            self.model.vocabulary_path = PathBuf::from(path);
        }

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = parse_env("API_PORT", port)?;
        }

        // Deployment
        if let Ok(region) = std::env::var("RELX_DEPLOY_REGION") {
            self.deploy.region = region;
        }
        if let Ok(arn) = std::env::var("RELX_EXECUTION_ROLE_ARN") {
            self.deploy.execution_role_arn = Some(arn);
        }
        if let Ok(endpoint) = std::env::var("RELX_DEPLOY_ENDPOINT") {
            self.deploy.endpoint = endpoint;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Number of workers used when none is configured
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Prediction pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker pool size per stage
    pub parallelism: usize,

    /// Split used for inference-time candidates
    pub split: u32,

    /// Decision threshold for the positive label
    pub threshold: f32,

    /// Label asserted when the positive score reaches the threshold
    pub positive_label: Label,

    /// Purge prior parse state for re-parsed documents
    pub parse_clear: bool,

    /// Purge prior mentions of re-processed documents
    pub mention_clear: bool,

    /// Purge the inference split before regenerating candidates
    pub candidate_clear: bool,

    /// Purge prior features of re-processed documents
    pub feature_clear: bool,

    /// Fraction of failed documents above which a batch is rejected
    pub max_parse_failure_ratio: f32,

    /// Documents larger than this are recorded as parse failures
    pub max_document_bytes: usize,

    /// TOML extraction schema (matchers, mention and candidate classes)
    pub schema_path: Option<PathBuf>,

    /// Candidate class scored by the model (defaults to the first one)
    pub candidate_class: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            split: 2,
            threshold: 0.6,
            positive_label: Label::True,
            parse_clear: false,
            mention_clear: false,
            candidate_clear: true,
            feature_clear: false,
            max_parse_failure_ratio: 1.0,
            max_document_bytes: 16 * 1024 * 1024, // 16MB
            schema_path: None,
            candidate_class: None,
        }
    }
}

impl PipelineConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.parallelism".to_string(),
                value: "0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.threshold".to_string(),
                value: self.threshold.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.max_parse_failure_ratio) {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.max_parse_failure_ratio".to_string(),
                value: self.max_parse_failure_ratio.to_string(),
            });
        }
        if self.positive_label == Label::Abstain {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.positive_label".to_string(),
                value: self.positive_label.to_string(),
            });
        }
        Ok(())
    }
}

/// Locations of the persisted training artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model checkpoint (architecture config, cardinality, weights)
    pub checkpoint_path: PathBuf,

    /// Feature-key vocabulary snapshot
    pub vocabulary_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("best_model.json"),
            vocabulary_path: PathBuf::from("feature_keys.json"),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// How a deployment treats an existing application of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Fail if the application exists
    Create,
    /// Replace the running model
    Replace,
    /// Add the model alongside the running one
    Add,
}

impl std::fmt::Display for DeployMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Replace => write!(f, "replace"),
            Self::Add => write!(f, "add"),
        }
    }
}

impl std::str::FromStr for DeployMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "replace" => Ok(Self::Replace),
            "add" => Ok(Self::Add),
            _ => Err(ConfigError::InvalidValue {
                key: "deploy.mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Application name on the hosting platform
    pub app_name: String,

    /// Hosting region
    pub region: String,

    /// Account owning the container registry
    pub account_id: Option<String>,

    /// Role the hosted model executes as
    pub execution_role_arn: Option<String>,

    /// Model artifact URI
    pub model_uri: Option<String>,

    /// Container image URL (derived from account/region/repository when unset)
    pub image_url: Option<String>,

    /// Container image repository
    pub image_repository: String,

    /// Container image tag
    pub image_tag: String,

    /// Create vs. update behaviour
    pub mode: DeployMode,

    /// Platform registration endpoint
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            app_name: "relx-model".to_string(),
            region: "eu-west-1".to_string(),
            account_id: None,
            execution_role_arn: None,
            model_uri: None,
            image_url: None,
            image_repository: "relx-serve".to_string(),
            image_tag: env!("CARGO_PKG_VERSION").to_string(),
            mode: DeployMode::Create,
            endpoint: "http://localhost:9090/api/v1/deployments".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<ConfigError> for crate::RelxError {
    fn from(err: ConfigError) -> Self {
        crate::RelxError::ConfigError(err.to_string())
    }
}
