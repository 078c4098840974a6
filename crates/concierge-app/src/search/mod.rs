// External web search: provider seam and the listing scrape pipeline.
//
// The pipeline runs one search, scrapes the first few result URLs
// concurrently with a per-call timeout, sanitizes whatever the extraction
// returned and dedupes across pages.

pub mod firecrawl;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use concierge_core::config::SearchConfig;
use concierge_core::external::{dedupe_by_address, listings_from_extraction, ExternalListing};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use firecrawl::FirecrawlClient;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} reported failure: {message}")]
    Service { endpoint: String, message: String },
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// One web search result. Every field is optional; providers fill what they have.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Web search returning up to `limit` hits.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;

    /// Scrape `url` with listing extraction; returns the raw extracted items.
    async fn scrape_listings(&self, url: &str) -> Result<Vec<Value>, SearchError>;
}

// ---------------------------------------------------------------------------
// External listing search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExternalSearchSettings {
    pub search_limit: usize,
    pub max_scrape_urls: usize,
    pub scrape_timeout: Duration,
    pub default_location: String,
}

impl From<&SearchConfig> for ExternalSearchSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            search_limit: config.search_limit,
            max_scrape_urls: config.max_scrape_urls,
            scrape_timeout: Duration::from_secs(config.scrape_timeout_secs),
            default_location: config.default_location.clone(),
        }
    }
}

impl ExternalSearchSettings {
    /// `"{query} {location} home for sale"`, falling back to the default
    /// location when none (or a blank one) is given.
    pub fn listing_query(&self, query: &str, location: Option<&str>) -> String {
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_location);
        format!("{} {} home for sale", query.trim(), location)
    }
}

/// Search, scrape the top result URLs concurrently, sanitize and dedupe.
///
/// A failed search is an error. Failed or timed-out scrapes only contribute
/// nothing to the result.
pub async fn find_external_listings(
    provider: &dyn SearchProvider,
    full_query: &str,
    settings: &ExternalSearchSettings,
) -> Result<Vec<ExternalListing>, SearchError> {
    info!(query = full_query, "external listing search");
    let hits = provider.search(full_query, settings.search_limit).await?;
    debug!(hits = hits.len(), "search results");

    let urls: Vec<&str> = hits
        .iter()
        .take(settings.max_scrape_urls)
        .filter_map(|hit| hit.url.as_deref())
        .collect();
    if urls.is_empty() {
        return Ok(Vec::new());
    }

    let year = chrono::Utc::now().year();
    let scrapes = urls
        .iter()
        .map(|url| scrape_with_timeout(provider, url, settings.scrape_timeout, year));
    let pages = join_all(scrapes).await;

    let listings = dedupe_by_address(pages.into_iter().flatten().collect());
    info!(count = listings.len(), "external listings after dedupe");
    Ok(listings)
}

/// Scrape one URL, giving up after `timeout`. Never fails: errors and
/// timeouts are logged and yield an empty page.
async fn scrape_with_timeout(
    provider: &dyn SearchProvider,
    url: &str,
    timeout: Duration,
    current_year: i32,
) -> Vec<ExternalListing> {
    debug!(url, "scraping");
    match tokio::time::timeout(timeout, provider.scrape_listings(url)).await {
        Ok(Ok(items)) => {
            let listings = listings_from_extraction(&items, current_year);
            debug!(url, extracted = items.len(), kept = listings.len(), "scrape finished");
            listings
        }
        Ok(Err(e)) => {
            warn!(url, "scrape failed: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!(url, timeout_secs = timeout.as_secs(), "scrape timed out");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ExternalSearchSettings {
        ExternalSearchSettings {
            search_limit: 5,
            max_scrape_urls: 2,
            scrape_timeout: Duration::from_secs(20),
            default_location: "Sioux City Iowa".into(),
        }
    }

    #[test]
    fn listing_query_uses_default_location() {
        let s = settings();
        assert_eq!(
            s.listing_query("waterfront", None),
            "waterfront Sioux City Iowa home for sale"
        );
        assert_eq!(
            s.listing_query("acreage ", Some("  ")),
            "acreage Sioux City Iowa home for sale"
        );
        assert_eq!(
            s.listing_query("condo", Some("Omaha NE")),
            "condo Omaha NE home for sale"
        );
    }

    #[test]
    fn settings_from_config() {
        let config = SearchConfig {
            scrape_timeout_secs: 7,
            search_limit: 4,
            max_scrape_urls: 1,
            default_location: "Le Mars Iowa".into(),
        };
        let s = ExternalSearchSettings::from(&config);
        assert_eq!(s.scrape_timeout, Duration::from_secs(7));
        assert_eq!(s.max_scrape_urls, 1);
    }
}
