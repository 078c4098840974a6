// Listing filter and sort used by the search page and the listing-search tool.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::listing::{Listing, ListingStatus, PropertyType};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Search criteria. Every `None` (or blank string) imposes no constraint; the
/// set fields are combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_beds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_beds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_baths: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_baths: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// A single invalid filter field, reported back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl ListingFilters {
    /// True when `listing` satisfies every set criterion.
    pub fn matches(&self, listing: &Listing) -> bool {
        if self.min_price.is_some_and(|min| listing.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price > max) {
            return false;
        }
        if self.min_beds.is_some_and(|min| listing.bedrooms < min) {
            return false;
        }
        if self.max_beds.is_some_and(|max| listing.bedrooms > max) {
            return false;
        }
        if self.min_baths.is_some_and(|min| listing.bathrooms < min) {
            return false;
        }
        if self.max_baths.is_some_and(|max| listing.bathrooms > max) {
            return false;
        }
        if self
            .property_type
            .is_some_and(|t| listing.property_type != t)
        {
            return false;
        }
        if self.status.is_some_and(|s| listing.status != s) {
            return false;
        }
        if let Some(city) = non_blank(&self.city) {
            if !listing.address.city.eq_ignore_ascii_case(city.trim()) {
                return false;
            }
        }
        if let Some(search) = non_blank(&self.search) {
            if !matches_text(listing, search) {
                return false;
            }
        }
        true
    }

    /// The matching subset of `listings`, in input order.
    pub fn apply<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        listings.iter().filter(|l| self.matches(l)).collect()
    }

    /// Reject inverted ranges and non-finite bath counts.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                errors.push(FieldError {
                    field: "maxPrice",
                    message: format!("must be at least minPrice ({min}), got {max}"),
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min_beds, self.max_beds) {
            if min > max {
                errors.push(FieldError {
                    field: "maxBeds",
                    message: format!("must be at least minBeds ({min}), got {max}"),
                });
            }
        }
        for (field, value) in [("minBaths", self.min_baths), ("maxBaths", self.max_baths)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    errors.push(FieldError {
                        field,
                        message: format!("must be a non-negative number, got {v}"),
                    });
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_baths, self.max_baths) {
            if min > max {
                errors.push(FieldError {
                    field: "maxBaths",
                    message: format!("must be at least minBaths ({min}), got {max}"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// True when no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_beds.is_none()
            && self.max_beds.is_none()
            && self.min_baths.is_none()
            && self.max_baths.is_none()
            && self.property_type.is_none()
            && self.status.is_none()
            && non_blank(&self.city).is_none()
            && non_blank(&self.search).is_none()
    }

    /// Parse search-page URL parameters (`q`, `minPrice`, `maxPrice`, `beds`,
    /// `baths`, `type`, `status`, `city`, `sort`). Values that fail to parse
    /// are ignored rather than rejected.
    ///
    /// A missing or blank `sort` means [`SortOption::Newest`]; an unrecognized
    /// one yields `None`, which keeps the filtered results in dataset order.
    pub fn from_query_pairs<'a, I>(pairs: I) -> (ListingFilters, Option<SortOption>)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filters = ListingFilters::default();
        let mut sort = Some(SortOption::default());

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "q" => filters.search = Some(value.to_string()),
                "minPrice" => filters.min_price = parse_price(value),
                "maxPrice" => filters.max_price = parse_price(value),
                "beds" => filters.min_beds = parse_leading_int(value),
                "baths" => filters.min_baths = parse_leading_int(value).map(f64::from),
                "type" => filters.property_type = PropertyType::from_label(value),
                "status" => filters.status = ListingStatus::from_label(value),
                "city" => filters.city = Some(value.to_string()),
                "sort" => sort = SortOption::from_key(value),
                _ => {}
            }
        }

        (filters, sort)
    }

    /// Decode a raw `a=1&b=2` query string and delegate to [`Self::from_query_pairs`].
    pub fn from_query_string(query: &str) -> (ListingFilters, Option<SortOption>) {
        let pairs: Vec<_> =
            form_urlencoded::parse(query.trim_start_matches('?').as_bytes()).collect();
        Self::from_query_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn matches_text(listing: &Listing, search: &str) -> bool {
    let needle = search.to_lowercase();
    listing.address_line().to_lowercase().contains(&needle)
        || listing.description.to_lowercase().contains(&needle)
        || listing
            .features
            .iter()
            .any(|f| f.to_lowercase().contains(&needle))
        || listing.mls_number.contains(search)
}

fn parse_price(value: &str) -> Option<u64> {
    let n: f64 = value.replace(',', "").parse().ok()?;
    (n.is_finite() && n > 0.0).then(|| n as u64)
}

/// `"3+"` → 3, `"2.5"` → 2, `"abc"` → None.
fn parse_leading_int(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_end_matches('+')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    PriceAsc,
    PriceDesc,
    BedsAsc,
    BedsDesc,
    #[default]
    Newest,
}

impl SortOption {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "price-asc" => Some(SortOption::PriceAsc),
            "price-desc" => Some(SortOption::PriceDesc),
            "beds-asc" => Some(SortOption::BedsAsc),
            "beds-desc" => Some(SortOption::BedsDesc),
            "newest" => Some(SortOption::Newest),
            _ => None,
        }
    }
}

/// Stable sort of an already-filtered result set.
///
/// `Newest` orders by days on market descending with missing values treated
/// as zero, which is how the dataset's producer ranks fresh imports.
pub fn sort_listings(mut listings: Vec<&Listing>, sort: SortOption) -> Vec<&Listing> {
    match sort {
        SortOption::PriceAsc => listings.sort_by_key(|l| l.price),
        SortOption::PriceDesc => listings.sort_by(|a, b| b.price.cmp(&a.price)),
        SortOption::BedsAsc => listings.sort_by_key(|l| l.bedrooms),
        SortOption::BedsDesc => listings.sort_by(|a, b| b.bedrooms.cmp(&a.bedrooms)),
        SortOption::Newest => listings.sort_by(|a, b| {
            b.days_on_market
                .unwrap_or(0)
                .cmp(&a.days_on_market.unwrap_or(0))
        }),
    }
    listings
}
