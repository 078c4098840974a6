// getAreaInfo: canned Siouxland area guide enriched with live dataset figures.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::format::format_price_range_compact;
use concierge_core::repository::ListingRepository;
use serde_json::{json, Value};

use super::{required_choice, Tool, ToolError};

const TOPICS: &[&str] = &["neighborhoods", "schools", "market", "general"];

pub struct AreaInfoTool {
    listings: Arc<ListingRepository>,
}

impl AreaInfoTool {
    pub fn new(listings: Arc<ListingRepository>) -> Self {
        Self { listings }
    }

    fn neighborhoods(&self) -> Value {
        json!({
            "overview": "Sioux City offers diverse neighborhoods catering to different lifestyles and budgets, from established historic areas to newer developments.",
            "coveredAreas": self.listings.unique_cities(),
            "highlights": [
                "**Morningside & Leeds** - Mix of single-family homes and townhouses, attracting families and professionals seeking community-oriented environments",
                "**West Side & Riverside** - Established homes with mature landscaping and convenient access to local amenities",
                "**The Heights & Indian Hills** - Higher-end properties with proximity to newer developments and recreation facilities",
                "**Country Club area** - Upscale neighborhood with golf course access",
                "**Dakota Dunes** - Upscale development with golf course and Missouri River views",
                "**South Sioux City** - Growing Nebraska community with new construction options",
                "**Le Mars** - The Ice Cream Capital of the World, quiet small-town living 25 minutes away"
            ]
        })
    }

    fn schools(&self) -> Value {
        json!({
            "overview": "Sioux City offers quality K-12 education with schools rated between 6/10 and 8/10 on GreatSchools.",
            "publicDistricts": [
                "Sioux City Community School District",
                "South Sioux City Community Schools",
                "Le Mars Community School District",
                "Sergeant Bluff-Luton CSD"
            ],
            "topRatedSchools": [
                "Dakota City Elementary - 8/10 rating",
                "Perry Creek Elementary - 7/10 rating"
            ],
            "note": "Each listing includes information about nearby schools. Ask about a specific property to see its assigned schools."
        })
    }

    fn market(&self) -> Value {
        let current_range = match self.listings.price_range() {
            Some(range) => json!({
                "min": range.min,
                "max": range.max,
                "formatted": format_price_range_compact(range),
            }),
            None => Value::Null,
        };
        json!({
            "overview": "The Sioux City housing market is competitive yet affordable, with median prices 52% below the national average.",
            "stats": {
                "medianSalePrice": "$209,000",
                "pricePerSqFt": "$135 (up 8% year-over-year)",
                "daysOnMarket": "22-24 days average",
                "saleToListRatio": "96.5% (some homes sell above list)"
            },
            "currentPriceRange": current_range,
            "areasServed": self.listings.unique_cities(),
            "marketTrends": [
                "Steady 2.5% year-over-year price appreciation",
                "High demand with homes selling in under a month",
                "New construction in suburban areas",
                "Strong rental market near colleges",
                "Growing demand for homes with acreage"
            ],
            "outlook": "Market expected to continue gradual appreciation due to steady demand, economic stability, and lower cost of living."
        })
    }

    fn general(&self) -> Value {
        let brokerage = self.listings.brokerage();
        json!({
            "overview": "Sioux City is a tri-state metro area where Iowa, Nebraska, and South Dakota meet along the Missouri River. Known for affordability, diverse economy, and quality of life.",
            "population": "Approximately 85,000 in Sioux City, 145,000 in metro area",
            "costOfLiving": "13% lower than the national average - housing, transportation, groceries, and healthcare are all more affordable here.",
            "economy": "Diversified economy with major employers in healthcare (MercyOne Siouxland Medical Center, UnityPoint), manufacturing, agriculture (Tyson Foods), and energy (MidAmerican Energy).",
            "recreation": [
                "Missouri River riverfront trails, boating, and fishing",
                "Stone State Park and numerous city parks",
                "Orpheum Theatre and downtown entertainment district",
                "Sioux City Art Center and local museums",
                "Dorothy Pecaut Nature Center",
                "Annual festivals, farmers markets, and community events",
                "Local dining scene with locally-owned restaurants"
            ],
            "climate": {
                "highlights": "Four seasons with minimal natural disaster risk",
                "wildfireRisk": "Less than 1%",
                "severeWindRisk": "Low"
            },
            "transportation": {
                "note": "Car-dependent community with good road infrastructure",
                "walkScore": 23,
                "transitScore": 36,
                "bikeScore": 36
            },
            "brokerage": {
                "name": brokerage.name,
                "contact": brokerage.phone
            }
        })
    }
}

#[async_trait]
impl Tool for AreaInfoTool {
    fn name(&self) -> &'static str {
        "getAreaInfo"
    }

    fn description(&self) -> &'static str {
        "Get information about the Sioux City, Iowa area including neighborhoods, schools, market \
         trends, cost of living, and local amenities. Use when users ask about the area, schools, \
         or community features."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "enum": TOPICS,
                    "description": "The topic to get information about"
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        Ok(match required_choice(args, "topic", TOPICS)? {
            "neighborhoods" => self.neighborhoods(),
            "schools" => self.schools(),
            "market" => self.market(),
            _ => self.general(),
        })
    }
}
