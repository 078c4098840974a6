// Shared fixtures for tool tests.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::repository::ListingRepository;
use serde_json::Value;

use crate::search::{SearchError, SearchHit, SearchProvider};

const LISTINGS: &str = include_str!("../../tests/fixtures/listings.json");

pub(crate) fn fixture_repository() -> Arc<ListingRepository> {
    Arc::new(ListingRepository::new(
        serde_json::from_str(LISTINGS).expect("fixture parses"),
    ))
}

/// Provider returning canned hits; every scrape yields `scraped`.
pub(crate) struct CannedSearch {
    pub hits: Vec<SearchHit>,
    pub scraped: Vec<Value>,
    pub fail_search: bool,
}

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        if self.fail_search {
            return Err(SearchError::Service {
                endpoint: "canned".into(),
                message: "down".into(),
            });
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn scrape_listings(&self, _url: &str) -> Result<Vec<Value>, SearchError> {
        Ok(self.scraped.clone())
    }
}
