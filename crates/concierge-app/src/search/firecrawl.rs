// Firecrawl REST client: web search and scrape with JSON extraction.

use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::Config;
use serde_json::{json, Value};
use tracing::debug;

use super::{SearchError, SearchHit, SearchProvider};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev";

/// Upper bound for any single HTTP call. Scrapes are additionally bounded by
/// the caller's (shorter) timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const EXTRACTION_PROMPT: &str = "Extract all real estate property listings visible on this page. \
For each listing, get the full address, price, bedrooms, bathrooms, square footage, year built if \
available, a brief description, and the main image URL. Only include actual property listings.";

/// JSON schema handed to the extraction step.
fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "listings": {
                "type": "array",
                "description": "Array of real estate property listings found on the page",
                "items": {
                    "type": "object",
                    "properties": {
                        "address": {
                            "type": "string",
                            "description": "Full street address including city and state (e.g., '123 Main St, Sioux City, IA 51104')"
                        },
                        "price": {
                            "type": "string",
                            "description": "Listing price with dollar sign (e.g., '$350,000')"
                        },
                        "bedrooms": { "type": "number", "description": "Number of bedrooms" },
                        "bathrooms": {
                            "type": "number",
                            "description": "Number of bathrooms (can include .5 for half baths)"
                        },
                        "squareFeet": { "type": "number", "description": "Total square footage of the property" },
                        "yearBuilt": { "type": "number", "description": "Year the property was built (e.g., 1985)" },
                        "description": {
                            "type": "string",
                            "description": "Brief description of the property features and amenities"
                        },
                        "imageUrl": { "type": "string", "description": "URL of the main property photo" },
                        "images": {
                            "type": "array",
                            "description": "Array of all property photo URLs found on the page",
                            "items": { "type": "string", "description": "URL of a property photo" }
                        }
                    },
                    "required": ["address"]
                }
            }
        },
        "required": ["listings"]
    })
}

// ---------------------------------------------------------------------------
// FirecrawlClient
// ---------------------------------------------------------------------------

pub struct FirecrawlClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            base_url: FIRECRAWL_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// `Some` only when a Firecrawl API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .credentials
            .firecrawl_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| Self::new(key.to_string()))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, SearchError> {
        let endpoint = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| SearchError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await.map_err(|source| SearchError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(SearchError::Service { endpoint, message });
        }

        Ok(value)
    }
}

#[async_trait]
impl SearchProvider for FirecrawlClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let body = json!({
            "query": query,
            "limit": limit,
            "scrapeOptions": { "formats": ["markdown"], "onlyMainContent": true },
        });
        let response = self.post_json("/v2/search", &body).await?;
        let hits = parse_search_hits(&response);
        debug!(query, hits = hits.len(), "firecrawl search");
        Ok(hits)
    }

    async fn scrape_listings(&self, url: &str) -> Result<Vec<Value>, SearchError> {
        let body = json!({
            "url": url,
            "formats": [{
                "type": "json",
                "prompt": EXTRACTION_PROMPT,
                "schema": extraction_schema(),
            }],
        });
        let response = self.post_json("/v2/scrape", &body).await?;
        Ok(extracted_listing_items(&response))
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Web results from a search response: `data.web` (v2) or a bare `data`
/// array (v1). Entries that are not objects are skipped.
pub(crate) fn parse_search_hits(response: &Value) -> Vec<SearchHit> {
    let data = response.get("data");
    let results = data
        .and_then(|d| d.get("web"))
        .or_else(|| response.get("web"))
        .or(data)
        .and_then(Value::as_array);

    results
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| {
                    let text = |key: &str| {
                        item.get(key)
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    };
                    SearchHit {
                        url: text("url"),
                        title: text("title"),
                        description: text("description"),
                        markdown: text("markdown"),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The extracted `listings` array, wherever this API version put it
/// (`data.json`, `json`, `data.extract` or `extract`).
pub(crate) fn extracted_listing_items(response: &Value) -> Vec<Value> {
    let candidates = [
        response.pointer("/data/json"),
        response.get("json"),
        response.pointer("/data/extract"),
        response.get("extract"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|extracted| extracted.get("listings").and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}
