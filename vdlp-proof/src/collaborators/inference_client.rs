//! HTTP client for the model inference service
//!
//! Two endpoints, both taking mono f32 PCM as JSON:
//! - `POST {base}/v1/authenticity` -> `{"probability_real": f64}`
//! - `POST {base}/v1/quality` -> `{"<metric>": f64, ...}` (DNSMOS sub-metrics)

use super::authenticity::SegmentClassifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use vdlp_common::config::InferenceConfig;

const USER_AGENT: &str = concat!("vdlp-proof/", env!("CARGO_PKG_VERSION"));

/// Inference client errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Model returned out-of-range probability {0}")]
    OutOfRange(f64),
}

impl From<InferenceError> for vdlp_common::Error {
    fn from(err: InferenceError) -> Self {
        vdlp_common::Error::Collaborator(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct SamplesRequest<'a> {
    sample_rate: u32,
    samples: &'a [f32],
}

#[derive(Debug, Deserialize)]
struct AuthenticityResponse {
    probability_real: f64,
}

/// Inference service client
pub struct InferenceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_samples<R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<R, InferenceError> {
        let url = format!("{}{}", self.base_url, endpoint);

        tracing::debug!(url = %url, samples = samples.len(), sample_rate, "Calling inference service");

        let response = self
            .http_client
            .post(&url)
            .json(&SamplesRequest {
                sample_rate,
                samples,
            })
            .send()
            .await
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| InferenceError::ParseError(e.to_string()))
    }

    /// Score one authenticity segment
    pub async fn authenticity(&self, samples: &[f32], sample_rate: u32) -> Result<f64, InferenceError> {
        let response: AuthenticityResponse =
            self.post_samples("/v1/authenticity", samples, sample_rate).await?;

        let p = response.probability_real;
        if !(0.0..=1.0).contains(&p) {
            return Err(InferenceError::OutOfRange(p));
        }
        Ok(p)
    }

    /// Fetch perceptual quality sub-metrics for a whole clip
    pub async fn quality(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<BTreeMap<String, f64>, InferenceError> {
        self.post_samples("/v1/quality", samples, sample_rate).await
    }
}

#[async_trait]
impl SegmentClassifier for InferenceClient {
    async fn classify(&self, segment: &[f32], sample_rate: u32) -> vdlp_common::Result<f64> {
        Ok(self.authenticity(segment, sample_rate).await?)
    }
}
