//! HTTP backend for the external inference service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use grantscout_core::{CancelSignal, ToolError};

use crate::backend::{InferenceBackend, InferenceRequest, InferenceResponse};

#[derive(Debug, Clone)]
pub struct HttpInferenceConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl HttpInferenceConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct HttpInferenceBackend {
    config: HttpInferenceConfig,
    client: Client,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
    input: &'a Value,
}

impl HttpInferenceBackend {
    pub fn new(config: HttpInferenceConfig) -> Result<Self, ToolError> {
        if config.api_key.is_empty() {
            return Err(ToolError::invalid_arguments(
                "inference API key not configured",
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ToolError::transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn generate(
        &self,
        request: InferenceRequest,
        cancel: &CancelSignal,
    ) -> Result<InferenceResponse, ToolError> {
        cancel.check()?;
        let started = Instant::now();

        let wire = WireRequest {
            prompt: &request.prompt,
            system: request.system.as_deref(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_schema: request.output_schema.as_ref(),
            input: &request.input,
        };

        let send = self
            .client
            .post(format!("{}/v1/generate", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&wire)
            .send();

        let response = tokio::select! {
            response = send => response
                .map_err(|e| if e.is_timeout() {
                    ToolError::timeout("inference request", self.config.timeout.as_secs_f64())
                } else {
                    ToolError::transient(format!("inference request failed: {e}"))
                })?,
            _ = cancel.cancelled() => return Err(ToolError::cancelled()),
        };

        match response.status() {
            StatusCode::OK => {
                let payload: Value = response
                    .json()
                    .await
                    .map_err(|e| ToolError::transient(format!("invalid inference body: {e}")))?;
                Ok(InferenceResponse {
                    payload,
                    latency_ms: started.elapsed().as_millis() as u64,
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ToolError::rate_limited("inference service returned 429"))
            }
            status if status.is_server_error() => Err(ToolError::transient(format!(
                "inference service returned {status}"
            ))),
            status => Err(ToolError::invalid_arguments(format!(
                "inference service rejected request: {status}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
