// Listing data model as stored in the bundled listings dataset.
//
// Field names mirror the snake_case keys of `data/listings.json`. Everything
// here is read-only after load.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "Single Family Home")]
    SingleFamilyHome,
    #[serde(rename = "Multi-Family Home")]
    MultiFamilyHome,
    #[serde(rename = "Condominium")]
    Condominium,
    #[serde(rename = "Land")]
    Land,
}

impl PropertyType {
    pub const ALL: [PropertyType; 4] = [
        PropertyType::SingleFamilyHome,
        PropertyType::MultiFamilyHome,
        PropertyType::Condominium,
        PropertyType::Land,
    ];

    /// Display label, identical to the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            PropertyType::SingleFamilyHome => "Single Family Home",
            PropertyType::MultiFamilyHome => "Multi-Family Home",
            PropertyType::Condominium => "Condominium",
            PropertyType::Land => "Land",
        }
    }

    /// Parse a display label (case-insensitive). Returns `None` for unknown labels.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingStatus {
    Active,
    Pending,
}

impl ListingStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ListingStatus::Active),
            "pending" => Some(ListingStatus::Pending),
            _ => None,
        }
    }
}

/// The raw dataset stores `virtual_tour` either as a URL or as a bare `true`
/// flag meaning "a tour exists somewhere". Only URLs are useful downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VirtualTour {
    Url(String),
    Flag(bool),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schools {
    pub elementary: String,
    pub middle: String,
    pub high: String,
}

/// Listing agent as recorded on the listing itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingAgent {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub date: String,
    pub event: String,
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub mls_number: String,
    pub address: Address,
    pub price: u64,
    pub status: ListingStatus,
    #[serde(default)]
    pub days_on_market: Option<u32>,
    pub property_type: PropertyType,
    pub bedrooms: u32,
    pub bathrooms: f64,
    #[serde(default)]
    pub square_feet: Option<u32>,
    #[serde(default)]
    pub lot_size: Option<String>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub style: Option<String>,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub taxes: Option<f64>,
    #[serde(default)]
    pub tax_year: Option<i32>,
    #[serde(default)]
    pub heating_cooling: Option<String>,
    #[serde(default)]
    pub basement: Option<String>,
    #[serde(default)]
    pub exterior: Option<String>,
    #[serde(default)]
    pub roof: Option<String>,
    #[serde(default)]
    pub sewer: Option<String>,
    #[serde(default)]
    pub schools: Option<Schools>,
    #[serde(default)]
    pub virtual_tour: Option<VirtualTour>,
    #[serde(default)]
    pub images: Vec<String>,
    pub agent: ListingAgent,
    #[serde(default)]
    pub listing_url: String,
    #[serde(default)]
    pub price_history: Vec<PriceHistoryEntry>,
}

impl Listing {
    /// Virtual tour URL, if the dataset recorded one (boolean flags are dropped).
    pub fn virtual_tour_url(&self) -> Option<&str> {
        match &self.virtual_tour {
            Some(VirtualTour::Url(url)) if !url.is_empty() => Some(url.as_str()),
            _ => None,
        }
    }

    pub fn main_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// "street city state", the haystack used by free-text search.
    pub fn address_line(&self) -> String {
        format!(
            "{} {} {}",
            self.address.street, self.address.city, self.address.state
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brokerage {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub website: String,
}

/// Top-level envelope of `listings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingsData {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub scraped_date: String,
    #[serde(default)]
    pub total_listings: usize,
    pub listings: Vec<Listing>,
    pub brokerage: Brokerage,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_uses_display_labels_on_the_wire() {
        let json = serde_json::to_string(&PropertyType::MultiFamilyHome).unwrap();
        assert_eq!(json, "\"Multi-Family Home\"");
        let parsed: PropertyType = serde_json::from_str("\"Condominium\"").unwrap();
        assert_eq!(parsed, PropertyType::Condominium);
    }

    #[test]
    fn property_type_from_label_is_case_insensitive() {
        assert_eq!(
            PropertyType::from_label("single family home"),
            Some(PropertyType::SingleFamilyHome)
        );
        assert_eq!(PropertyType::from_label("Castle"), None);
    }

    #[test]
    fn virtual_tour_accepts_url_or_flag() {
        let url: VirtualTour = serde_json::from_str("\"https://tour.example/1\"").unwrap();
        assert_eq!(url, VirtualTour::Url("https://tour.example/1".into()));
        let flag: VirtualTour = serde_json::from_str("true").unwrap();
        assert_eq!(flag, VirtualTour::Flag(true));
    }

    #[test]
    fn status_from_label() {
        assert_eq!(ListingStatus::from_label("ACTIVE"), Some(ListingStatus::Active));
        assert_eq!(ListingStatus::from_label("sold"), None);
    }
}
