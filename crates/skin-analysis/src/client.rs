use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    strip_data_url, Acknowledgement, AnalysisResponse, ApiConfig, IdentityRequest, ImageRequest,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis service returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("request to analysis service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AnalysisError {
    /// HTTP status for non-2xx failures
    pub fn status(&self) -> Option<u16> {
        match self {
            AnalysisError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The two calls the screens make against the analysis service.
/// One attempt per call; callers present failures and let the user retry.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    async fn submit_identity(
        &self,
        name: &str,
        location: &str,
    ) -> Result<Acknowledgement, AnalysisError>;

    async fn submit_image(&self, image_base64: &str) -> Result<AnalysisResponse, AnalysisError>;
}

/// HTTP client for the remote analysis service
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    config: ApiConfig,
}

impl AnalysisClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(ApiConfig::from_env())
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// POST a JSON body and return (status, body text) for 2xx answers
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(u16, String), AnalysisError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Analysis API error status {} from {}", status.as_u16(), url);
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok((status.as_u16(), text))
    }
}

#[async_trait]
impl AnalysisApi for AnalysisClient {
    async fn submit_identity(
        &self,
        name: &str,
        location: &str,
    ) -> Result<Acknowledgement, AnalysisError> {
        let request = IdentityRequest {
            name: name.to_string(),
            location: location.to_string(),
        };
        let (status, text) = self.post_json(&self.config.phase_one_url, &request).await?;

        // The body is only logged, so a non-JSON answer is kept as a string
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        info!("Identity submitted ({}): {}", status, body);

        Ok(Acknowledgement { status, body })
    }

    async fn submit_image(&self, image_base64: &str) -> Result<AnalysisResponse, AnalysisError> {
        let request = ImageRequest {
            image: strip_data_url(image_base64).to_string(),
        };
        debug!("Submitting image payload ({} bytes base64)", request.image.len());

        let (_, text) = self.post_json(&self.config.phase_two_url, &request).await?;
        let response: AnalysisResponse = serde_json::from_str(&text)?;

        info!(
            "Demographics received: {} race, {} age, {} gender labels",
            response.data.race.len(),
            response.data.age.len(),
            response.data.gender.len()
        );
        Ok(response)
    }
}
