use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ParameterChange, ShotId},
    error::{ErrorBody, ValidationError},
    protocol::{
        ModifyParameterRequest, RefineShotRequest, ServiceStatus, Shot, ShotEnvelope,
        ShotListResponse, ShotSpec,
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::Settings, error::ClientError};

#[async_trait]
pub trait ShotBackend: Send + Sync {
    async fn create_shot(&self, spec: &ShotSpec) -> Result<Shot, ClientError>;
    async fn list_shots(&self) -> Result<Vec<Shot>, ClientError>;
    async fn get_shot(&self, shot_id: &ShotId) -> Result<Shot, ClientError>;
    async fn modify_parameter(
        &self,
        shot_id: &ShotId,
        change: ParameterChange,
    ) -> Result<Shot, ClientError>;
    async fn refine_shot(
        &self,
        shot_id: &ShotId,
        prompt: &str,
        apply_hdr: bool,
    ) -> Result<Shot, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResolver {
    base: Url,
}

impl ArtifactResolver {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Absolute locators are returned unchanged.
    pub fn output_url(&self, path: &str) -> Result<Url, ClientError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ValidationError::EmptyField("artifact path").into());
        }
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        let relative = path.replace('\\', "/");
        self.base
            .join(relative.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn download_url(&self, filename: &str) -> Result<Url, ClientError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ValidationError::EmptyField("filename").into());
        }
        endpoint_url(&self.base, &["api", "download", filename])
    }
}

fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl {
            url: base.to_string(),
            reason: "base url cannot carry a path".into(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub struct GenerationClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let base_url = settings.base_url()?;
        let timeout = settings.request_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(settings.connect_timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Transport {
                endpoint: base_url.to_string(),
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn artifacts(&self) -> ArtifactResolver {
        ArtifactResolver::new(self.base_url.clone())
    }

    pub async fn health(&self) -> Result<ServiceStatus, ClientError> {
        let url = self.base_url.clone();
        self.execute(url.as_str(), self.http.get(url.clone())).await
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        endpoint_url(&self.base_url, segments)
    }

    fn transport_error(&self, endpoint: &str, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            ClientError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        debug!(endpoint, "http: sending request");
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.message());
            warn!(
                endpoint,
                status = status.as_u16(),
                detail = detail.as_deref().unwrap_or(""),
                "http: backend rejected request"
            );
            return Err(ClientError::Backend {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ShotBackend for GenerationClient {
    async fn create_shot(&self, spec: &ShotSpec) -> Result<Shot, ClientError> {
        let request = spec.to_request()?;
        let url = self.url(&["api", "shots", "create"])?;
        let envelope: ShotEnvelope = self
            .execute(url.as_str(), self.http.post(url.clone()).json(&request))
            .await?;
        info!(
            shot_id = %envelope.shot.shot_id,
            message = envelope.message.as_deref().unwrap_or(""),
            "http: shot created"
        );
        Ok(envelope.shot)
    }

    async fn list_shots(&self) -> Result<Vec<Shot>, ClientError> {
        let url = self.url(&["api", "shots"])?;
        let list: ShotListResponse = self
            .execute(url.as_str(), self.http.get(url.clone()))
            .await?;
        if let Some(total) = list.total {
            if total != list.shots.len() {
                warn!(total, received = list.shots.len(), "http: shot list total mismatch");
            }
        }
        Ok(list.shots)
    }

    async fn get_shot(&self, shot_id: &ShotId) -> Result<Shot, ClientError> {
        if shot_id.is_empty() {
            return Err(ValidationError::EmptyField("shot_id").into());
        }
        let url = self.url(&["api", "shots", shot_id.as_str()])?;
        let envelope: ShotEnvelope = self
            .execute(url.as_str(), self.http.get(url.clone()))
            .await?;
        Ok(envelope.shot)
    }

    async fn modify_parameter(
        &self,
        shot_id: &ShotId,
        change: ParameterChange,
    ) -> Result<Shot, ClientError> {
        if shot_id.is_empty() {
            return Err(ValidationError::EmptyField("shot_id").into());
        }
        let url = self.url(&["api", "shots", shot_id.as_str(), "modify"])?;
        let request = ModifyParameterRequest::new(shot_id.clone(), change);
        let envelope: ShotEnvelope = self
            .execute(url.as_str(), self.http.post(url.clone()).json(&request))
            .await?;
        Ok(envelope.shot)
    }

    async fn refine_shot(
        &self,
        shot_id: &ShotId,
        prompt: &str,
        apply_hdr: bool,
    ) -> Result<Shot, ClientError> {
        if shot_id.is_empty() {
            return Err(ValidationError::EmptyField("shot_id").into());
        }
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyField("refinement_prompt").into());
        }
        let url = self.url(&["api", "shots", shot_id.as_str(), "refine"])?;
        let request = RefineShotRequest {
            shot_id: shot_id.clone(),
            refinement_prompt: prompt.trim().to_string(),
            apply_hdr,
        };
        let envelope: ShotEnvelope = self
            .execute(url.as_str(), self.http.post(url.clone()).json(&request))
            .await?;
        Ok(envelope.shot)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
