// Read-only listings repository backed by the bundled JSON dataset.
//
// Loaded once at startup and shared behind an `Arc`; every query borrows from
// the in-memory dataset and never mutates it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::filter::{sort_listings, ListingFilters, SortOption};
use crate::listing::{Brokerage, Listing, ListingsData};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read data file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse data file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Lowest and highest asking price across the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

// ---------------------------------------------------------------------------
// ListingRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ListingRepository {
    data: ListingsData,
}

impl ListingRepository {
    pub fn new(data: ListingsData) -> Self {
        Self { data }
    }

    /// Load the dataset from a JSON file on disk.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path).map_err(|source| DataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let data: ListingsData =
            serde_json::from_str(&text).map_err(|source| DataError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            listings = data.listings.len(),
            brokerage = %data.brokerage.name,
            "loaded listings from {}",
            path.display()
        );
        Ok(Self::new(data))
    }

    pub fn listings(&self) -> &[Listing] {
        &self.data.listings
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Listing> {
        self.data.listings.iter().find(|l| l.id == id)
    }

    /// The `count` most expensive listings.
    pub fn featured(&self, count: usize) -> Vec<&Listing> {
        let mut all: Vec<&Listing> = self.data.listings.iter().collect();
        all.sort_by(|a, b| b.price.cmp(&a.price));
        all.truncate(count);
        all
    }

    /// Other listings in `listing`'s city, in dataset order.
    pub fn same_city(&self, listing: &Listing, count: usize) -> Vec<&Listing> {
        self.data
            .listings
            .iter()
            .filter(|l| l.id != listing.id && l.address.city == listing.address.city)
            .take(count)
            .collect()
    }

    pub fn filter(&self, filters: &ListingFilters) -> Vec<&Listing> {
        filters.apply(&self.data.listings)
    }

    /// Filter then sort, the search page's query. `None` keeps dataset order.
    pub fn search(&self, filters: &ListingFilters, sort: Option<SortOption>) -> Vec<&Listing> {
        match sort {
            Some(sort) => sort_listings(self.filter(filters), sort),
            None => self.filter(filters),
        }
    }

    /// Distinct city names, sorted.
    pub fn unique_cities(&self) -> Vec<String> {
        self.data
            .listings
            .iter()
            .map(|l| l.address.city.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `None` when the dataset is empty.
    pub fn price_range(&self) -> Option<PriceRange> {
        let min = self.data.listings.iter().map(|l| l.price).min()?;
        let max = self.data.listings.iter().map(|l| l.price).max()?;
        Some(PriceRange { min, max })
    }

    pub fn brokerage(&self) -> &Brokerage {
        &self.data.brokerage
    }

}
