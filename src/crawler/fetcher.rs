//! HTTP source for the herbarium site
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings
//! - Politeness delay between requests
//! - Retry with exponential backoff for transient failures
//! - Status classification into ledger error types

use crate::catalog::FragmentKind;
use crate::config::{Config, UserAgentConfig};
use crate::crawler::parser::{parse_fragment, parse_index_page, parse_species_links};
use crate::crawler::politeness::PolitenessGate;
use crate::crawler::source::{
    Discovery, EntityDiscovery, FailureKind, FetchFailure, FragmentFetcher, SpeciesCatalog,
};
use crate::state::{EntityId, FragmentContent};
use crate::HarvestError;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Index pages shorter than this are treated as empty responses
const MIN_INDEX_BODY_LEN: usize = 100;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use herbarium_harvest::config::UserAgentConfig;
/// use herbarium_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "HerbariumHarvest".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch-and-parse collaborator backed by the live site
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 404 / 403 / 410 | Immediate permanent failure |
/// | HTTP 429 | Retry with backoff, then `rate_limit` |
/// | HTTP 5xx | Retry with backoff, then `server_error` |
/// | Timeout / connection error | Retry with backoff, then `network_error` |
///
/// Backoff starts at `retry-backoff` and doubles per attempt.
pub struct HerbariumClient {
    client: Client,
    base_url: Url,
    gate: PolitenessGate,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HerbariumClient {
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.fetch.request_timeout),
        )?;

        Ok(Self {
            client,
            base_url: normalize_base(&config.site.base_url)?,
            gate: PolitenessGate::new(Duration::from_millis(config.fetch.download_delay)),
            max_retries: config.fetch.max_retries,
            retry_backoff: Duration::from_millis(config.fetch.retry_backoff),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn page_url(&self, path: &str) -> Result<Url, FetchFailure> {
        self.base_url.join(path).map_err(|e| {
            FetchFailure::new(FailureKind::NetworkError, format!("Bad URL {}: {}", path, e))
        })
    }

    /// GETs a page, retrying transient failures
    async fn fetch_page(&self, url: &Url) -> Result<String, FetchFailure> {
        let mut attempt = 0;

        loop {
            self.gate.wait_turn().await;
            tracing::debug!("GET {}", url);

            let failure = match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => FetchFailure::new(FailureKind::NetworkError, e.to_string()),
                        }
                    } else {
                        let kind = FailureKind::from_status(status.as_u16())
                            .unwrap_or(FailureKind::ServerError);
                        FetchFailure::new(kind, status_message(status.as_u16()))
                    }
                }
                Err(e) if e.is_timeout() => {
                    FetchFailure::new(FailureKind::NetworkError, "Request timeout")
                }
                Err(e) if e.is_connect() => {
                    FetchFailure::new(FailureKind::NetworkError, "Connection refused")
                }
                Err(e) => FetchFailure::new(FailureKind::NetworkError, e.to_string()),
            };

            if !failure.is_retryable() || attempt >= self.max_retries {
                return Err(failure);
            }

            let backoff = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
            attempt += 1;
            tracing::debug!(
                "{} for {}, retry {}/{} in {:?}",
                failure,
                url,
                attempt,
                self.max_retries,
                backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl SpeciesCatalog for HerbariumClient {
    async fn list_species(&self) -> Result<Vec<EntityId>, FetchFailure> {
        let url = self.page_url("menu_species.php")?;
        let body = self.fetch_page(&url).await?;

        let ids = parse_species_links(&body, &url);
        tracing::info!("Found {} species in listing", ids.len());
        Ok(ids)
    }
}

#[async_trait]
impl EntityDiscovery for HerbariumClient {
    async fn discover(&self, id: &EntityId) -> Result<Discovery, FetchFailure> {
        let url = self.page_url(&format!("herbarium.php?id={}", id))?;
        let body = self.fetch_page(&url).await?;

        if body.len() < MIN_INDEX_BODY_LEN {
            return Err(FetchFailure::new(
                FailureKind::EmptyResponse,
                "Response body too small",
            ));
        }

        let scraped_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Ok(parse_index_page(&body, url.as_str(), scraped_at))
    }
}

#[async_trait]
impl FragmentFetcher for HerbariumClient {
    async fn fetch_fragment(
        &self,
        id: &EntityId,
        kind: FragmentKind,
    ) -> Result<FragmentContent, FetchFailure> {
        let url = self.page_url(&format!("{}?id={}", kind.page_path(), id))?;
        let body = self.fetch_page(&url).await?;
        Ok(parse_fragment(kind, &body))
    }
}

/// Ensures the base URL ends with a slash so relative joins stay under it
fn normalize_base(base_url: &str) -> Result<Url, url::ParseError> {
    if base_url.ends_with('/') {
        Url::parse(base_url)
    } else {
        Url::parse(&format!("{}/", base_url))
    }
}

fn status_message(status: u16) -> String {
    match status {
        404 => "Page not found".to_string(),
        403 => "Access forbidden".to_string(),
        410 => "Resource gone".to_string(),
        429 => "Too many requests".to_string(),
        _ => format!("HTTP {}", status),
    }
}
