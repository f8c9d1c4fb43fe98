//! Model deployment client
//!
//! Registers a model artifact together with the serving container image on
//! a hosting platform. The request is validated locally before anything is
//! sent.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use relx_core::{DeployConfig, DeployMode};

/// Deployment errors
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Missing deployment setting: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Deployment rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Deployment request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Container image URL in a regional registry
pub fn registry_image_url(account_id: &str, region: &str, repository: &str, tag: &str) -> String {
    format!("{account_id}.dkr.ecr.{region}.amazonaws.com/{repository}:{tag}")
}

/// A fully resolved deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub app_name: String,
    pub region: String,
    pub execution_role_arn: String,
    pub model_uri: String,
    pub image_url: String,
    pub mode: DeployMode,
}

impl DeployRequest {
    /// Resolve a request from configuration, deriving the image URL when unset
    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        let image_url = match (&config.image_url, &config.account_id) {
            (Some(url), _) => url.clone(),
            (None, Some(account)) => registry_image_url(
                account,
                &config.region,
                &config.image_repository,
                &config.image_tag,
            ),
            (None, None) => return Err(DeployError::MissingField("image_url or account_id")),
        };

        let request = Self {
            app_name: config.app_name.clone(),
            region: config.region.clone(),
            execution_role_arn: config
                .execution_role_arn
                .clone()
                .ok_or(DeployError::MissingField("execution_role_arn"))?,
            model_uri: config
                .model_uri
                .clone()
                .ok_or(DeployError::MissingField("model_uri"))?,
            image_url,
            mode: config.mode,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), DeployError> {
        if self.app_name.is_empty() || self.app_name.len() > 63 {
            return Err(DeployError::InvalidValue {
                field: "app_name",
                reason: "must be 1 to 63 characters".to_string(),
            });
        }
        if !self
            .app_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
            || self.app_name.starts_with('-')
        {
            return Err(DeployError::InvalidValue {
                field: "app_name",
                reason: format!("{} may only contain letters, digits and inner hyphens", self.app_name),
            });
        }
        if self.region.trim().is_empty() {
            return Err(DeployError::MissingField("region"));
        }
        if !self.execution_role_arn.starts_with("arn:") {
            return Err(DeployError::InvalidValue {
                field: "execution_role_arn",
                reason: format!("{} is not an ARN", self.execution_role_arn),
            });
        }
        if self.model_uri.trim().is_empty() {
            return Err(DeployError::MissingField("model_uri"));
        }
        match self.image_url.rsplit_once(':') {
            Some((repo, tag)) if !repo.is_empty() && !tag.is_empty() && !tag.contains('/') => {}
            _ => {
                return Err(DeployError::InvalidValue {
                    field: "image_url",
                    reason: format!("{} has no image tag", self.image_url),
                })
            }
        }
        Ok(())
    }
}

/// Platform acknowledgement of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    pub app_name: String,
    pub status: String,
    #[serde(default)]
    pub deployment_id: Option<String>,
}

/// Anything that can host a model
#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployReceipt, DeployError>;
}

/// Posts deployments as JSON to a registration endpoint
pub struct HttpDeploymentTarget {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDeploymentTarget {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DeployError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl DeploymentTarget for HttpDeploymentTarget {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployReceipt, DeployError> {
        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            app_name = %request.app_name,
            region = %request.region,
            mode = %request.mode,
            image_url = %request.image_url,
            "Submitting deployment"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Request-Id", request_id.to_string())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let receipt: DeployReceipt = response.json().await?;
        info!(%request_id, status = %receipt.status, "Deployment accepted");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    fn config() -> DeployConfig {
        DeployConfig {
            app_name: "relx-pob-presidents".to_string(),
            region: "eu-west-1".to_string(),
            account_id: Some("123456789012".to_string()),
            execution_role_arn: Some("arn:aws:iam::123456789012:role/Hosting".to_string()),
            model_uri: Some("artifacts/0/run/model".to_string()),
            image_url: None,
            image_repository: "relx-serve".to_string(),
            image_tag: "1.0.0".to_string(),
            ..DeployConfig::default()
        }
    }

    #[test]
    fn test_image_url_is_derived() {
        let request = DeployRequest::from_config(&config()).unwrap();
        assert_eq!(
            request.image_url,
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/relx-serve:1.0.0"
        );
        assert_eq!(request.mode, DeployMode::Create);
    }

    #[test]
    fn test_explicit_image_url_wins() {
        let mut cfg = config();
        cfg.account_id = None;
        cfg.image_url = Some("registry.local/relx:latest".to_string());

        let request = DeployRequest::from_config(&cfg).unwrap();
        assert_eq!(request.image_url, "registry.local/relx:latest");
    }

    #[test]
    fn test_missing_settings() {
        let mut cfg = config();
        cfg.execution_role_arn = None;
        assert!(matches!(
            DeployRequest::from_config(&cfg),
            Err(DeployError::MissingField("execution_role_arn"))
        ));

        let mut cfg = config();
        cfg.account_id = None;
        assert!(matches!(
            DeployRequest::from_config(&cfg),
            Err(DeployError::MissingField(_))
        ));
    }

    #[test]
    fn test_validation() {
        let good = DeployRequest::from_config(&config()).unwrap();

        let mut bad = good.clone();
        bad.app_name = "bad_name".to_string();
        assert!(bad.validate().is_err());

        let mut bad = good.clone();
        bad.execution_role_arn = "Hosting".to_string();
        assert!(bad.validate().is_err());

        let mut bad = good.clone();
        bad.image_url = "registry.local:5000/relx".to_string();
        assert!(bad.validate().is_err());

        let mut bad = good;
        bad.model_uri = " ".to_string();
        assert!(matches!(bad.validate(), Err(DeployError::MissingField("model_uri"))));
    }

    #[test]
    fn test_request_wire_format() {
        let request = DeployRequest::from_config(&config()).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mode"], "create");
        assert_eq!(json["app_name"], "relx-pob-presidents");
    }

    async fn spawn_platform(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/deployments")
    }

    #[tokio::test]
    async fn test_http_target_posts_request() {
        let router = Router::new().route(
            "/deployments",
            post(|Json(req): Json<DeployRequest>| async move {
                Json(DeployReceipt {
                    app_name: req.app_name,
                    status: format!("{}d", req.mode),
                    deployment_id: Some("dep-1".to_string()),
                })
            }),
        );
        let endpoint = spawn_platform(router).await;
        let target = HttpDeploymentTarget::new(endpoint, Duration::from_secs(5)).unwrap();

        let request = DeployRequest::from_config(&config()).unwrap();
        let receipt = target.deploy(&request).await.unwrap();

        assert_eq!(receipt.app_name, "relx-pob-presidents");
        assert_eq!(receipt.status, "created");
        assert_eq!(receipt.deployment_id.as_deref(), Some("dep-1"));
    }

    #[tokio::test]
    async fn test_http_target_reports_rejection() {
        let router = Router::new().route(
            "/deployments",
            post(|| async { (StatusCode::CONFLICT, "application exists") }),
        );
        let endpoint = spawn_platform(router).await;
        let target = HttpDeploymentTarget::new(endpoint, Duration::from_secs(5)).unwrap();

        let request = DeployRequest::from_config(&config()).unwrap();
        let err = target.deploy(&request).await.unwrap_err();

        assert!(matches!(err, DeployError::Rejected { status: 409, .. }));
        assert!(err.to_string().contains("application exists"));
    }
}
