// External (scraped) listings: typing, sanitization and dedupe.
//
// Records arrive from a hosted scrape + LLM-extraction service whose output is
// only loosely shaped. Each field is validated on its own; a bad field is
// cleared, the rest of the record survives.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const BEDROOM_RANGE: (f64, f64) = (1.0, 15.0);
pub const BATHROOM_RANGE: (f64, f64) = (0.5, 10.0);
pub const SQUARE_FEET_RANGE: (f64, f64) = (100.0, 50_000.0);
pub const EARLIEST_YEAR_BUILT: i32 = 1800;

pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const DESCRIPTION_MIN_CHARS: usize = 20;
pub const ADDRESS_MAX_CHARS: usize = 200;
pub const MAX_GALLERY_IMAGES: usize = 20;

const DEFAULT_PRICE: &str = "Contact for Price";
const DEFAULT_TITLE: &str = "Property Listing";

/// Substrings that mark tracking pixels and stock placeholders.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "spacer.gif",
    "pixel.gif",
    "1x1",
    "blank.png",
    "placeholder",
    "no-image",
];

/// Gallery entries are also screened for site chrome.
const GALLERY_EXTRA_PATTERNS: &[&str] = &["icon", "logo", "avatar"];

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
static BARE_URL_IN_PROSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)]+").expect("valid regex"));
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static MARKDOWN_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_#`]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

// ---------------------------------------------------------------------------
// ExternalListing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalListing {
    pub title: String,
    pub address: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ExternalListing {
    /// Type one extracted item. Fields of the wrong JSON type are treated as
    /// absent; no range checks happen here.
    pub fn from_extracted(item: &Value) -> Option<Self> {
        let obj = item.as_object()?;
        let string = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| obj.get(key).and_then(Value::as_f64);

        let address = string("address");
        let images = obj
            .get("images")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(ExternalListing {
            title: address.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            address: address.unwrap_or_default(),
            price: string("price").unwrap_or_else(|| DEFAULT_PRICE.to_string()),
            bedrooms: number("bedrooms"),
            bathrooms: number("bathrooms"),
            square_feet: number("squareFeet"),
            year_built: obj.get("yearBuilt").and_then(|v| {
                v.as_i64()
                    .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            }),
            property_type: Some("Single Family Home".to_string()),
            description: string("description").unwrap_or_default(),
            image_url: string("imageUrl"),
            images,
        })
    }

    /// Validate and clean each field independently against `current_year`.
    pub fn sanitize(mut self, current_year: i32) -> Self {
        self.bedrooms = self.bedrooms.filter(|v| in_range(*v, BEDROOM_RANGE));
        self.bathrooms = self.bathrooms.filter(|v| in_range(*v, BATHROOM_RANGE));
        self.square_feet = self.square_feet.filter(|v| in_range(*v, SQUARE_FEET_RANGE));
        let latest_year = i64::from(current_year) + 2;
        self.year_built = self
            .year_built
            .filter(|y| (i64::from(EARLIEST_YEAR_BUILT)..=latest_year).contains(y));

        if !self.description.is_empty() {
            self.description = clean_description(&self.description);
        }
        if !self.address.is_empty() {
            self.address = clean_address(&self.address);
        }

        self.image_url = self
            .image_url
            .filter(|url| is_absolute_http(url) && !matches_any(url, PLACEHOLDER_PATTERNS));

        let mut seen = HashSet::new();
        self.images = std::mem::take(&mut self.images)
            .into_iter()
            .filter(|url| is_absolute_http(url))
            .filter(|url| {
                !matches_any(url, PLACEHOLDER_PATTERNS) && !matches_any(url, GALLERY_EXTRA_PATTERNS)
            })
            .filter(|url| seen.insert(url.clone()))
            .take(MAX_GALLERY_IMAGES)
            .collect();

        if self.image_url.is_none() {
            self.image_url = self.images.first().cloned();
        }

        self
    }

    /// Heuristic for "this looks like a street address": more than 10
    /// characters and at least one digit.
    pub fn has_plausible_address(&self) -> bool {
        !self.address.is_empty()
            && self.address.chars().count() > 10
            && self.address.chars().any(|c| c.is_ascii_digit())
    }

    /// Key used to collapse the same property reported by different pages.
    pub fn dedupe_key(&self) -> String {
        self.address
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

/// Type, sanitize and screen every item of an extraction payload's `listings`
/// array. Items without a plausible address are dropped.
pub fn listings_from_extraction(items: &[Value], current_year: i32) -> Vec<ExternalListing> {
    items
        .iter()
        .filter_map(ExternalListing::from_extracted)
        .map(|l| l.sanitize(current_year))
        .filter(ExternalListing::has_plausible_address)
        .collect()
}

/// Drop later records whose address matches an earlier one ignoring case and
/// whitespace.
pub fn dedupe_by_address(listings: Vec<ExternalListing>) -> Vec<ExternalListing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| seen.insert(l.dedupe_key()))
        .collect()
}

// ---------------------------------------------------------------------------
// Text cleanup helpers
// ---------------------------------------------------------------------------

fn in_range(value: f64, (lo, hi): (f64, f64)) -> bool {
    value.is_finite() && value >= lo && value <= hi
}

fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn matches_any(url: &str, patterns: &[&str]) -> bool {
    let lower = url.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

fn strip_markdown(text: &str, url_pattern: &Regex) -> String {
    let text = MARKDOWN_LINK.replace_all(text, "$1");
    let text = url_pattern.replace_all(&text, "");
    let text = MARKDOWN_EMPHASIS.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Markdown-free, single-line description; empty when what is left is too
/// short or contains no letters.
pub fn clean_description(text: &str) -> String {
    let cleaned = truncate_chars(&strip_markdown(text, &BARE_URL_IN_PROSE), DESCRIPTION_MAX_CHARS);
    if cleaned.chars().count() < DESCRIPTION_MIN_CHARS
        || !cleaned.chars().any(|c| c.is_ascii_alphabetic())
    {
        return String::new();
    }
    cleaned
}

pub fn clean_address(text: &str) -> String {
    truncate_chars(&strip_markdown(text, &BARE_URL), ADDRESS_MAX_CHARS)
}
