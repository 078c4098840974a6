// Tools over the local listings repository: search, details, agent contact
// and contact next-steps.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::filter::ListingFilters;
use concierge_core::format::{format_preview_address, format_price, format_short_address};
use concierge_core::listing::{Listing, ListingStatus, PropertyType};
use concierge_core::repository::ListingRepository;
use serde_json::{json, Value};

use super::{
    optional_choice, optional_number, optional_string, require_object, required_choice,
    required_string, Tool, ToolError,
};

/// Preview records returned per search.
pub const SEARCH_RESULT_LIMIT: usize = 5;

const PROPERTY_TYPES: &[&str] = &[
    "Single Family Home",
    "Multi-Family Home",
    "Condominium",
    "Land",
];

const CONTACT_INTENTS: &[&str] = &["viewing", "general_inquiry", "selling", "buying"];

// ---------------------------------------------------------------------------
// Result shaping
// ---------------------------------------------------------------------------

/// Compact listing card used in search results.
pub fn listing_preview(listing: &Listing) -> Value {
    json!({
        "id": listing.id,
        "address": format_preview_address(&listing.address),
        "price": listing.price,
        "priceFormatted": format_price(listing.price),
        "bedrooms": listing.bedrooms,
        "bathrooms": listing.bathrooms,
        "squareFeet": listing.square_feet,
        "propertyType": listing.property_type,
        "status": listing.status,
        "mainImage": listing.main_image(),
        "hasVirtualTour": listing.virtual_tour_url().is_some(),
    })
}

/// Preview plus everything the detail view needs.
pub fn listing_details(listing: &Listing) -> Value {
    let mut details = listing_preview(listing);
    let extra = json!({
        "description": listing.description,
        "features": listing.features,
        "yearBuilt": listing.year_built,
        "lotSize": listing.lot_size,
        "style": listing.style,
        "basement": listing.basement,
        "heatingCooling": listing.heating_cooling,
        "schools": listing.schools,
        "virtualTourUrl": listing.virtual_tour_url(),
        "images": listing.images,
        "agent": {
            "name": listing.agent.name,
            "title": listing.agent.title,
            "phone": listing.agent.phone,
            "email": listing.agent.email,
            "company": listing.agent.company,
        },
        "mlsNumber": listing.mls_number,
        "daysOnMarket": listing.days_on_market,
    });
    if let (Some(target), Value::Object(extra)) = (details.as_object_mut(), extra) {
        target.extend(extra);
    }
    details
}

fn listing_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "listingId": { "type": "string", "description": "The ID of the listing" }
        },
        "required": ["listingId"]
    })
}

// ---------------------------------------------------------------------------
// searchListings
// ---------------------------------------------------------------------------

pub struct SearchListingsTool {
    listings: Arc<ListingRepository>,
}

impl SearchListingsTool {
    pub fn new(listings: Arc<ListingRepository>) -> Self {
        Self { listings }
    }

    /// Build filters from tool arguments. Only active listings are searched.
    pub fn parse_filters(args: &Value) -> Result<ListingFilters, ToolError> {
        require_object(args)?;

        // Bounds on integer fields round inward so the comparison is unchanged.
        let filters = ListingFilters {
            min_price: optional_number(args, "minPrice")?.map(|n| n.ceil() as u64),
            max_price: optional_number(args, "maxPrice")?.map(|n| n.floor() as u64),
            min_beds: optional_number(args, "minBeds")?.map(|n| n.ceil() as u32),
            max_beds: optional_number(args, "maxBeds")?.map(|n| n.floor() as u32),
            min_baths: optional_number(args, "minBaths")?,
            max_baths: optional_number(args, "maxBaths")?,
            property_type: optional_choice(args, "propertyType", PROPERTY_TYPES)?
                .and_then(PropertyType::from_label),
            status: Some(ListingStatus::Active),
            city: optional_string(args, "city")?,
            search: optional_string(args, "search")?,
        };

        if let Err(errors) = filters.validate() {
            if let Some(first) = errors.into_iter().next() {
                return Err(ToolError::invalid(first.field, first.message));
            }
        }
        Ok(filters)
    }
}

#[async_trait]
impl Tool for SearchListingsTool {
    fn name(&self) -> &'static str {
        "searchListings"
    }

    fn description(&self) -> &'static str {
        "Search for property listings based on user criteria. Use this when users describe what \
         they're looking for in a home. Returns up to 5 matching properties with basic info."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "minPrice": { "type": "number", "description": "Minimum price in dollars" },
                "maxPrice": { "type": "number", "description": "Maximum price in dollars" },
                "minBeds": { "type": "number", "description": "Minimum number of bedrooms" },
                "maxBeds": { "type": "number", "description": "Maximum number of bedrooms" },
                "minBaths": { "type": "number", "description": "Minimum number of bathrooms" },
                "maxBaths": { "type": "number", "description": "Maximum number of bathrooms" },
                "propertyType": {
                    "type": "string",
                    "enum": PROPERTY_TYPES,
                    "description": "Type of property"
                },
                "city": { "type": "string", "description": "City name to filter by" },
                "search": {
                    "type": "string",
                    "description": "General search term for address, features, or description"
                }
            }
        })
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let filters = Self::parse_filters(args)?;
        let results = self.listings.filter(&filters);
        let shown: Vec<Value> = results
            .iter()
            .take(SEARCH_RESULT_LIMIT)
            .map(|l| listing_preview(l))
            .collect();

        Ok(json!({
            "totalFound": results.len(),
            "showing": shown.len(),
            "hasMore": results.len() > SEARCH_RESULT_LIMIT,
            "listings": shown,
            "availableCities": self.listings.unique_cities(),
            "priceRange": self.listings.price_range(),
        }))
    }
}

// ---------------------------------------------------------------------------
// getListingDetails
// ---------------------------------------------------------------------------

pub struct GetListingDetailsTool {
    listings: Arc<ListingRepository>,
}

impl GetListingDetailsTool {
    pub fn new(listings: Arc<ListingRepository>) -> Self {
        Self { listings }
    }
}

#[async_trait]
impl Tool for GetListingDetailsTool {
    fn name(&self) -> &'static str {
        "getListingDetails"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific property listing. Use when a user wants to \
         know more about a particular property."
    }

    fn input_schema(&self) -> Value {
        listing_id_schema()
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let id = required_string(args, "listingId")?;
        Ok(match self.listings.get_by_id(&id) {
            Some(listing) => json!({ "found": true, "listing": listing_details(listing) }),
            None => json!({
                "found": false,
                "error": "Listing not found. It may have been sold or removed.",
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// getAgentContact
// ---------------------------------------------------------------------------

pub struct GetAgentContactTool {
    listings: Arc<ListingRepository>,
}

impl GetAgentContactTool {
    pub fn new(listings: Arc<ListingRepository>) -> Self {
        Self { listings }
    }
}

#[async_trait]
impl Tool for GetAgentContactTool {
    fn name(&self) -> &'static str {
        "getAgentContact"
    }

    fn description(&self) -> &'static str {
        "Get the contact information for a listing's agent. Use when a user wants to schedule a \
         viewing or contact an agent."
    }

    fn input_schema(&self) -> Value {
        listing_id_schema()
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let id = required_string(args, "listingId")?;
        let Some(listing) = self.listings.get_by_id(&id) else {
            return Ok(json!({ "found": false, "error": "Listing not found." }));
        };

        let brokerage = self.listings.brokerage();
        let agent = &listing.agent;
        let phone = agent.phone.as_deref().unwrap_or(&brokerage.phone);
        let email = agent.email.as_deref().unwrap_or(&brokerage.email);

        Ok(json!({
            "found": true,
            "agent": {
                "name": agent.name,
                "title": agent.title,
                "phone": agent.phone,
                "email": agent.email,
                "company": agent.company.as_deref().unwrap_or(&brokerage.name),
            },
            "property": {
                "address": format_short_address(&listing.address),
                "mlsNumber": listing.mls_number,
            },
            "brokerage": {
                "name": brokerage.name,
                "phone": brokerage.phone,
                "email": brokerage.email,
            },
            "suggestion": format!(
                "To schedule a viewing, you can call {} directly at {phone} or email {email}. \
                 Mention you're interested in MLS# {}.",
                agent.name, listing.mls_number
            ),
        }))
    }
}

// ---------------------------------------------------------------------------
// initiateContact
// ---------------------------------------------------------------------------

pub struct InitiateContactTool {
    listings: Arc<ListingRepository>,
}

impl InitiateContactTool {
    pub fn new(listings: Arc<ListingRepository>) -> Self {
        Self { listings }
    }
}

fn next_steps(intent: &str, listing: Option<&Listing>) -> Vec<String> {
    let steps: &[&str] = match intent {
        "viewing" => {
            let agent = listing
                .map(|l| format!(" ({})", l.agent.name))
                .unwrap_or_default();
            let mls = listing.map_or("ready", |l| l.mls_number.as_str());
            return vec![
                format!("Call the listing agent{agent} to schedule a showing"),
                format!("Have MLS# {mls} when you call"),
                "Prepare any questions about the property".to_string(),
                "Consider getting pre-approved for financing before viewing".to_string(),
            ];
        }
        "selling" => &[
            "Contact our office for a free home valuation",
            "We'll discuss your timeline and goals",
            "Get tips on preparing your home for sale",
            "Review our marketing strategy",
        ],
        "buying" => &[
            "Get pre-approved for a mortgage to know your budget",
            "Make a list of must-haves vs nice-to-haves",
            "Contact an agent to start your home search",
            "We can set up alerts for new listings matching your criteria",
        ],
        _ => &[
            "Call or email us with your questions",
            "We're happy to help with any real estate needs",
            "No obligation - just friendly, expert advice",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl Tool for InitiateContactTool {
    fn name(&self) -> &'static str {
        "initiateContact"
    }

    fn description(&self) -> &'static str {
        "Generate contact information and next steps for scheduling a property viewing. Use when \
         users express they want to see a property or contact someone about it."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "listingId": {
                    "type": "string",
                    "description": "The ID of a specific listing, if applicable"
                },
                "intent": {
                    "type": "string",
                    "enum": CONTACT_INTENTS,
                    "description": "What the user wants to do"
                }
            },
            "required": ["intent"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let intent = required_choice(args, "intent", CONTACT_INTENTS)?;
        let listing = match optional_string(args, "listingId")? {
            Some(id) => self.listings.get_by_id(&id),
            None => None,
        };
        let brokerage = self.listings.brokerage();

        let mut contacts = Vec::new();
        if let Some(l) = listing {
            contacts.push(json!({
                "type": "Listing Agent",
                "name": l.agent.name,
                "phone": l.agent.phone,
                "email": l.agent.email,
            }));
        }
        contacts.push(json!({
            "type": "Brokerage Office",
            "name": brokerage.name,
            "phone": brokerage.phone,
            "email": brokerage.email,
        }));

        let mut response = json!({
            "intent": intent,
            "nextSteps": next_steps(intent, listing),
            "contacts": contacts,
        });
        if let Some(l) = listing {
            response["listingInfo"] = json!({
                "address": format_short_address(&l.address),
                "mlsNumber": l.mls_number,
            });
        }
        Ok(response)
    }
}
