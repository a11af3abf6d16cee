use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Herbarium-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    pub output: OutputConfig,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root URL of the herbarium site (e.g., "https://aurovilleherbarium.org")
    #[serde(rename = "base-url")]
    pub base_url: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Request pacing and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Minimum time between two requests to the site (milliseconds)
    #[serde(rename = "download-delay")]
    pub download_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Retries for server errors, rate limiting and network errors
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Initial retry backoff (milliseconds), doubled on each attempt
    #[serde(rename = "retry-backoff")]
    pub retry_backoff: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_delay: 3000,
            request_timeout: 30,
            max_retries: 5,
            retry_backoff: 500,
        }
    }
}

/// Tunables for the completion policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Time after the first fragment before partial completion or failure (milliseconds)
    #[serde(rename = "timeout-window")]
    pub timeout_window: u64,

    /// Absolute minimum number of responses for a partial completion
    #[serde(rename = "min-responses")]
    pub min_responses: usize,

    /// Minimum fraction of expected responses for a partial completion
    #[serde(rename = "min-fraction")]
    pub min_fraction: f64,
}

impl AggregationConfig {
    pub fn timeout_window(&self) -> Duration {
        Duration::from_millis(self.timeout_window)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            timeout_window: 60_000,
            min_responses: 2,
            min_fraction: 0.6,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one JSON file per species
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Status ledger file name, relative to the output directory
    #[serde(rename = "status-file", default = "default_status_file")]
    pub status_file: String,
}

impl OutputConfig {
    /// Full path of the status ledger file
    pub fn status_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.status_file)
    }
}

fn default_status_file() -> String {
    "_scraping_status.json".to_string()
}
