//! Process settings loaded at startup.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub budget: BudgetSettings,

    #[serde(default)]
    pub concurrency: ConcurrencySettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub rate_limits: RateLimitSettings,

    #[serde(default)]
    pub retries: RetrySettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub inference: InferenceSettings,
}

/// Budget caps in account units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSettings {
    /// Default ceiling applied to a workflow run when the definition does
    /// not carry its own.
    #[serde(default = "default_run_ceiling")]
    pub default_run_ceiling: f64,
    pub daily_cap: Option<f64>,
    pub monthly_cap: Option<f64>,
}

fn default_run_ceiling() -> f64 {
    1.0
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            default_run_ceiling: default_run_ceiling(),
            daily_cap: None,
            monthly_cap: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencySettings {
    /// Worker pool size; 0 means the number of CPU cores.
    #[serde(default)]
    pub worker_pool: usize,

    /// Screening sub-pool bound; 0 means min(CPU, 8).
    #[serde(default)]
    pub screening_pool: usize,

    /// Admission queue length before callers observe QueueFull.
    #[serde(default = "default_admission_queue")]
    pub admission_queue: usize,
}

fn default_admission_queue() -> usize {
    256
}

impl ConcurrencySettings {
    pub fn worker_pool_size(&self) -> usize {
        if self.worker_pool > 0 {
            self.worker_pool
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        }
    }

    pub fn screening_pool_size(&self) -> usize {
        if self.screening_pool > 0 {
            self.screening_pool
        } else {
            self.worker_pool_size().min(8)
        }
    }
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            worker_pool: 0,
            screening_pool: 0,
            admission_queue: default_admission_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Result-cache entry cap across all tools.
    #[serde(default = "default_result_cache_capacity")]
    pub result_cache_capacity: usize,

    /// Minimum entries retained per tool when the LRU evicts.
    #[serde(default = "default_min_retention")]
    pub per_tool_min_retention: usize,

    /// Fallback TTL when a tool's metadata declares none, in seconds.
    #[serde(default = "default_result_ttl")]
    pub default_result_ttl_secs: u64,

    /// Enrichment record TTL. The ProPublica contract requires ≥ 7 days.
    #[serde(default = "default_enrichment_ttl")]
    pub enrichment_ttl_secs: u64,
}

fn default_result_cache_capacity() -> usize {
    10_000
}

fn default_min_retention() -> usize {
    8
}

fn default_result_ttl() -> u64 {
    24 * 60 * 60
}

fn default_enrichment_ttl() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            result_cache_capacity: default_result_cache_capacity(),
            per_tool_min_retention: default_min_retention(),
            default_result_ttl_secs: default_result_ttl(),
            enrichment_ttl_secs: default_enrichment_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Minimum delay between ProPublica requests, in milliseconds.
    #[serde(default = "default_propublica_delay_ms")]
    pub propublica_min_delay_ms: u64,

    /// ProPublica hourly request ceiling.
    #[serde(default = "default_propublica_hourly")]
    pub propublica_hourly_ceiling: u32,
}

fn default_propublica_delay_ms() -> u64 {
    200
}

fn default_propublica_hourly() -> u32 {
    3_600
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            propublica_min_delay_ms: default_propublica_delay_ms(),
            propublica_hourly_ceiling: default_propublica_hourly(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    /// Exponential back-off base, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Jitter fraction applied to each back-off interval, in [0, 1].
    #[serde(default = "default_jitter")]
    pub backoff_jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            default_max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Directory scanned for tool metadata files.
    #[serde(default = "default_tools_dir")]
    pub tools_dir: String,

    /// Business Master File CSV.
    #[serde(default = "default_bmf_path")]
    pub bmf_path: String,

    /// Workflow checkpoint directory.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// Scoring table overrides, optional.
    #[serde(default)]
    pub scoring_tables: Option<String>,
}

fn default_tools_dir() -> String {
    "config/tools".to_string()
}

fn default_bmf_path() -> String {
    "data/bmf.csv".to_string()
}

fn default_checkpoint_dir() -> String {
    "data/checkpoints".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            tools_dir: default_tools_dir(),
            bmf_path: default_bmf_path(),
            checkpoint_dir: default_checkpoint_dir(),
            scoring_tables: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// External inference endpoint.
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,

    /// API key; usually injected through GRANTSCOUT_INFERENCE__API_KEY.
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

fn default_inference_endpoint() -> String {
    "https://inference.internal.grantscout.dev".to_string()
}

fn default_inference_timeout() -> u64 {
    60
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            api_key: String::new(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an optional TOML file layered under `GRANTSCOUT_*`
    /// environment variables (`GRANTSCOUT_BUDGET__DAILY_CAP=5.0`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix("GRANTSCOUT").separator("__"))
            .build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget.default_run_ceiling <= 0.0 {
            return Err(ConfigError::invalid(
                "budget.default_run_ceiling",
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.retries.backoff_jitter) {
            return Err(ConfigError::invalid(
                "retries.backoff_jitter",
                "must be within [0, 1]",
            ));
        }
        if self.cache.enrichment_ttl_secs < 7 * 24 * 60 * 60 {
            return Err(ConfigError::invalid(
                "cache.enrichment_ttl_secs",
                "enrichment TTL must be at least 7 days",
            ));
        }
        if self.concurrency.admission_queue == 0 {
            return Err(ConfigError::invalid(
                "concurrency.admission_queue",
                "admission queue must hold at least one entry",
            ));
        }
        Ok(())
    }
}
