//! The lookup client.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use reqwest::{Client, StatusCode};

use grantscout_core::normalize::parse_ein;
use grantscout_core::{CancelSignal, ErrorKind, ToolError};

use crate::pacer::RequestPacer;
use crate::record::{summary_from_payload, EnrichmentRecord};

#[derive(Debug, Clone)]
pub struct ProPublicaConfig {
    pub base_url: String,
    /// Minimum delay between requests across the whole process.
    pub min_delay: Duration,
    pub hourly_ceiling: u32,
    pub max_retries: u32,
    /// Contractual floor is seven days.
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub backoff_base: Duration,
}

impl Default for ProPublicaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://projects.propublica.org/nonprofits".to_string(),
            min_delay: Duration::from_millis(200),
            hourly_ceiling: 3_600,
            max_retries: 3,
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            request_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(500),
        }
    }
}

pub struct ProPublicaClient {
    config: ProPublicaConfig,
    client: Client,
    pacer: RequestPacer,
    cache: DashMap<String, (EnrichmentRecord, Instant)>,
}

impl ProPublicaClient {
    pub fn new(config: ProPublicaConfig) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ToolError::transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            pacer: RequestPacer::new(config.min_delay, config.hourly_ceiling),
            client,
            cache: DashMap::new(),
            config,
        })
    }

    /// Fetch the enrichment record for an EIN, serving from cache within
    /// the TTL. Only the terminal outcome is returned: retryable faults are
    /// retried internally and a terminal failure becomes a Failed record.
    pub async fn lookup(&self, ein: &str, cancel: &CancelSignal) -> EnrichmentRecord {
        let Some(parsed) = parse_ein(ein) else {
            return EnrichmentRecord::failed(ein, ErrorKind::InvalidArguments);
        };
        let ein = parsed.canonical;

        if let Some(entry) = self.cache.get(&ein) {
            let (record, fetched) = entry.value();
            if fetched.elapsed() < self.config.cache_ttl {
                tracing::trace!(ein = %ein, "enrichment cache hit");
                return record.clone();
            }
        }

        let record = match self.fetch_with_retries(&ein, cancel).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(ein = %ein, kind = err.kind().as_str(), "enrichment lookup failed");
                EnrichmentRecord::failed(&ein, err.kind())
            }
        };

        self.cache.insert(ein, (record.clone(), Instant::now()));
        record
    }

    async fn fetch_with_retries(
        &self,
        ein: &str,
        cancel: &CancelSignal,
    ) -> Result<EnrichmentRecord, ToolError> {
        let mut attempt = 0;
        loop {
            cancel.check()?;
            match self.fetch_once(ein).await {
                Ok(record) => return Ok(record),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff_for(attempt);
                    tracing::debug!(
                        ein = %ein,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        kind = err.kind().as_str(),
                        "retrying enrichment lookup"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => return Err(ToolError::cancelled()),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, ein: &str) -> Result<EnrichmentRecord, ToolError> {
        self.pacer.acquire().await?;

        let digits: String = ein.chars().filter(|c| c.is_ascii_digit()).collect();
        let url = format!("{}/api/v2/organizations/{digits}.json", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::transient(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let payload: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| ToolError::transient(format!("invalid response body: {e}")))?;
                Ok(EnrichmentRecord::ok(ein, summary_from_payload(&payload)))
            }
            StatusCode::NOT_FOUND => Err(ToolError::not_found(format!("EIN {ein} not listed"))),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ToolError::rate_limited("explorer API returned 429"))
            }
            status if status.is_server_error() => {
                Err(ToolError::transient(format!("explorer API returned {status}")))
            }
            status => Err(ToolError::transient(format!("unexpected status {status}"))),
        }
    }

    /// Exponential back-off with jitter.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base.as_millis() as f64;
        let exp = base * 2f64.powi(attempt.saturating_sub(1) as i32);
        let jitter = rand::thread_rng().gen_range(0.0..0.25);
        Duration::from_millis((exp * (1.0 + jitter)) as u64)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
