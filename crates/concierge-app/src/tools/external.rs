// Web-backed tools: external listing search and local area research.
//
// Both tools degrade to a `success: false` object when no search provider is
// configured or the provider fails. They never return a tool error for
// service problems.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{optional_string, required_choice, required_string, Tool, ToolError};
use crate::search::{find_external_listings, ExternalSearchSettings, SearchHit, SearchProvider};

// ---------------------------------------------------------------------------
// searchExternalListings
// ---------------------------------------------------------------------------

pub struct SearchExternalListingsTool {
    search: Option<Arc<dyn SearchProvider>>,
    settings: ExternalSearchSettings,
}

impl SearchExternalListingsTool {
    pub fn new(search: Option<Arc<dyn SearchProvider>>, settings: ExternalSearchSettings) -> Self {
        Self { search, settings }
    }
}

fn no_external_results() -> Value {
    json!({ "success": false, "totalFound": 0, "listings": [] })
}

#[async_trait]
impl Tool for SearchExternalListingsTool {
    fn name(&self) -> &'static str {
        "searchExternalListings"
    }

    fn description(&self) -> &'static str {
        "Search for additional property listings when local inventory doesn't have what the user \
         wants. Use this when local search returned 0 or very few results, the user asks for \
         property types we don't have (waterfront, luxury, acreage, historic, hot tub, pool), the \
         user wants to see more options on the market, or the user is looking outside our typical \
         coverage. Returns listings in the same format as local listings for uniform display."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query describing what the user wants, e.g. 'waterfront homes', 'homes with hot tub', 'luxury homes'"
                },
                "location": {
                    "type": "string",
                    "description": "City and state to search in; defaults to the home market"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let query = required_string(args, "query")?;
        let location = optional_string(args, "location")?;

        let Some(search) = &self.search else {
            info!("external search requested without a search provider");
            return Ok(no_external_results());
        };

        let full_query = self.settings.listing_query(&query, location.as_deref());
        match find_external_listings(search.as_ref(), &full_query, &self.settings).await {
            Ok(listings) => Ok(json!({
                "success": true,
                "totalFound": listings.len(),
                "listings": listings,
            })),
            Err(e) => {
                warn!("external listing search failed: {e}");
                Ok(no_external_results())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// researchLocalArea
// ---------------------------------------------------------------------------

const RESEARCH_TOPICS: &[&str] = &[
    "dining",
    "recreation",
    "events",
    "shopping",
    "healthcare",
    "education",
    "transportation",
    "other",
];

const RESEARCH_SEARCH_LIMIT: usize = 5;
const RESEARCH_MAX_RESULTS: usize = 3;
const SNIPPET_MAX_CHARS: usize = 300;
const MARKDOWN_MAX_CHARS: usize = 500;
const MARKDOWN_MIN_CHARS: usize = 50;

const MSG_UNAVAILABLE: &str =
    "Research service unavailable. Please contact our office for local recommendations.";
const MSG_FAILED: &str =
    "I had trouble researching that. Feel free to ask our agents - they know the area well!";
const MSG_NO_HITS: &str = "I couldn't find specific information about that. Our agents are locals \
and can provide personalized recommendations when you connect with them!";
const MSG_NOTHING_SPECIFIC: &str = "I found some general information but nothing specific. Our \
local agents can help with personalized recommendations!";
const RESEARCH_NOTE: &str = "This information is sourced from web search and may not be \
exhaustive. Our agents live in the area and can provide personal recommendations!";

pub struct ResearchLocalAreaTool {
    search: Option<Arc<dyn SearchProvider>>,
    area_name: String,
}

impl ResearchLocalAreaTool {
    pub fn new(search: Option<Arc<dyn SearchProvider>>, area_name: &str) -> Self {
        Self {
            search,
            area_name: area_name.to_string(),
        }
    }

    /// `"{query} {area} {topic}"`; the `other` topic adds nothing.
    fn search_query(&self, query: &str, topic: &str) -> String {
        let topic = if topic == "other" { "" } else { topic };
        format!("{} {} {}", query, self.area_name, topic).trim().to_string()
    }
}

fn research_failure(message: &str) -> Value {
    json!({ "success": false, "message": message, "results": [] })
}

/// Summarize one hit. Hits with a title and description keep both; otherwise
/// the leading markdown is stripped of formatting and kept when substantial.
fn summarize_hit(hit: &SearchHit) -> Option<Value> {
    if let (Some(title), Some(description)) = (nonempty(&hit.title), nonempty(&hit.description)) {
        let mut entry = json!({
            "title": title,
            "snippet": take_chars(description, SNIPPET_MAX_CHARS),
        });
        if let Some(url) = &hit.url {
            entry["url"] = json!(url);
        }
        return Some(entry);
    }

    let markdown = nonempty(&hit.markdown)?;
    let content: String = take_chars(markdown, MARKDOWN_MAX_CHARS)
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '_' | '[' | ']' | '(' | ')'))
        .collect();
    let content = content.trim();
    if content.chars().count() <= MARKDOWN_MIN_CHARS {
        return None;
    }
    Some(json!({
        "title": nonempty(&hit.title).unwrap_or("Local Information"),
        "snippet": content,
    }))
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn take_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[async_trait]
impl Tool for ResearchLocalAreaTool {
    fn name(&self) -> &'static str {
        "researchLocalArea"
    }

    fn description(&self) -> &'static str {
        "Research information about the local area that isn't in our built-in knowledge base. Use \
         this when users ask about local restaurants, cafes and bars, parks and trails, community \
         events and festivals, shopping, healthcare facilities and gyms, transportation options, \
         or other local amenities. Only use this for questions about the local area, not for \
         general knowledge."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to research about the area, e.g. 'best restaurants near Morningside', 'parks and recreation', 'upcoming events'"
                },
                "topic": {
                    "type": "string",
                    "enum": RESEARCH_TOPICS,
                    "description": "Category of the research query"
                }
            },
            "required": ["query", "topic"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let query = required_string(args, "query")?;
        let topic = required_choice(args, "topic", RESEARCH_TOPICS)?;

        let Some(search) = &self.search else {
            return Ok(research_failure(MSG_UNAVAILABLE));
        };

        let search_query = self.search_query(&query, topic);
        info!(query = %search_query, "area research");
        let hits = match search.search(&search_query, RESEARCH_SEARCH_LIMIT).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("area research failed: {e}");
                return Ok(research_failure(MSG_FAILED));
            }
        };

        if hits.is_empty() {
            return Ok(json!({ "success": true, "message": MSG_NO_HITS, "results": [] }));
        }

        let results: Vec<Value> = hits
            .iter()
            .take(RESEARCH_MAX_RESULTS)
            .filter_map(summarize_hit)
            .collect();
        let message = if results.is_empty() {
            MSG_NOTHING_SPECIFIC.to_string()
        } else {
            format!("Here's what I found about the {} area:", self.area_name)
        };

        Ok(json!({
            "success": true,
            "topic": topic,
            "query": query,
            "message": message,
            "results": results,
            "note": RESEARCH_NOTE,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::search::SearchError;
    use crate::tools::test_support::CannedSearch;

    fn settings() -> ExternalSearchSettings {
        ExternalSearchSettings {
            search_limit: 5,
            max_scrape_urls: 2,
            scrape_timeout: Duration::from_secs(20),
            default_location: "Sioux City Iowa".into(),
        }
    }

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            url: Some(url.into()),
            ..SearchHit::default()
        }
    }

    fn scraped_page() -> Vec<Value> {
        vec![
            json!({ "address": "1200 Riverside Blvd, Sioux City, IA 51109", "price": "$315,000", "bedrooms": 3 }),
            json!({ "address": "1200 riverside blvd, sioux city, ia 51109", "price": "$315,000" }),
            json!({ "address": "Call us", "price": "$1" }),
        ]
    }

    #[tokio::test]
    async fn external_search_without_provider() {
        let tool = SearchExternalListingsTool::new(None, settings());
        let out = tool.execute(&json!({ "query": "hot tub" })).await.unwrap();
        assert_eq!(out, json!({ "success": false, "totalFound": 0, "listings": [] }));
    }

    #[tokio::test]
    async fn external_search_dedupes_across_pages() {
        let provider = CannedSearch {
            hits: vec![hit("https://a.example"), hit("https://b.example"), hit("https://c.example")],
            scraped: scraped_page(),
            fail_search: false,
        };
        let tool = SearchExternalListingsTool::new(Some(Arc::new(provider)), settings());
        let out = tool.execute(&json!({ "query": "hot tub" })).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["totalFound"], 1);
        assert_eq!(out["listings"][0]["price"], "$315,000");
        assert_eq!(out["listings"][0]["bedrooms"], 3.0);
    }

    #[tokio::test]
    async fn external_search_failure_is_not_a_tool_error() {
        let provider = CannedSearch {
            hits: vec![],
            scraped: vec![],
            fail_search: true,
        };
        let tool = SearchExternalListingsTool::new(Some(Arc::new(provider)), settings());
        let out = tool.execute(&json!({ "query": "pool" })).await.unwrap();
        assert_eq!(out["success"], false);
    }

    #[tokio::test]
    async fn external_search_requires_query() {
        let tool = SearchExternalListingsTool::new(None, settings());
        let err = tool.execute(&json!({ "location": "Omaha" })).await.unwrap_err();
        assert_eq!(err, ToolError::invalid("query", "is required"));
    }

    /// Scrapes of `slow_url` never finish; every other URL returns `page`.
    struct SlowScrape {
        slow_url: &'static str,
        page: Vec<Value>,
    }

    #[async_trait]
    impl SearchProvider for SlowScrape {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
            Ok(vec![hit(self.slow_url), hit("https://fast.example")])
        }

        async fn scrape_listings(&self, url: &str) -> Result<Vec<Value>, SearchError> {
            if url == self.slow_url {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(self.page.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_scrape_contributes_nothing() {
        let provider = SlowScrape {
            slow_url: "https://slow.example",
            page: vec![json!({ "address": "77 Hamilton Blvd, Sioux City, IA 51103", "price": "$210,000" })],
        };
        let tool = SearchExternalListingsTool::new(Some(Arc::new(provider)), settings());
        let out = tool.execute(&json!({ "query": "ranch" })).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["totalFound"], 1);
        assert_eq!(out["listings"][0]["address"], "77 Hamilton Blvd, Sioux City, IA 51103");
    }

    fn research_tool(provider: Option<CannedSearch>) -> ResearchLocalAreaTool {
        ResearchLocalAreaTool::new(
            provider.map(|p| Arc::new(p) as Arc<dyn SearchProvider>),
            "Sioux City, Iowa",
        )
    }

    #[test]
    fn research_query_drops_other_topic() {
        let tool = research_tool(None);
        assert_eq!(tool.search_query("tacos", "dining"), "tacos Sioux City, Iowa dining");
        assert_eq!(tool.search_query("dog parks", "other"), "dog parks Sioux City, Iowa");
    }

    #[tokio::test]
    async fn research_without_provider() {
        let out = research_tool(None)
            .execute(&json!({ "query": "tacos", "topic": "dining" }))
            .await
            .unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], MSG_UNAVAILABLE);
    }

    #[tokio::test]
    async fn research_summarizes_first_three_hits() {
        let long_markdown = format!("# Trails\n\n**Stone State Park** has [hiking](x) {}", "and more ".repeat(80));
        let hits = vec![
            SearchHit {
                url: Some("https://eat.example".into()),
                title: Some("Best Tacos".into()),
                description: Some("d".repeat(400)),
                markdown: None,
            },
            SearchHit {
                markdown: Some(long_markdown),
                ..SearchHit::default()
            },
            SearchHit {
                title: Some("Too short".into()),
                markdown: Some("# tiny".into()),
                ..SearchHit::default()
            },
            SearchHit {
                title: Some("Fourth".into()),
                description: Some("never reached".into()),
                ..SearchHit::default()
            },
        ];
        let out = research_tool(Some(CannedSearch {
            hits,
            scraped: vec![],
            fail_search: false,
        }))
        .execute(&json!({ "query": "things to do", "topic": "recreation" }))
        .await
        .unwrap();

        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["url"], "https://eat.example");
        assert_eq!(results[0]["snippet"].as_str().unwrap().len(), 300);
        assert_eq!(results[1]["title"], "Local Information");
        let snippet = results[1]["snippet"].as_str().unwrap();
        assert!(snippet.starts_with("Trails"));
        assert!(!snippet.contains(['#', '*', '[', ']', '(', ')']));
        assert!(results[1].get("url").is_none());
        assert_eq!(out["topic"], "recreation");
        assert_eq!(out["note"], RESEARCH_NOTE);
    }

    #[tokio::test]
    async fn research_with_no_hits() {
        let out = research_tool(Some(CannedSearch {
            hits: vec![],
            scraped: vec![],
            fail_search: false,
        }))
        .execute(&json!({ "query": "ice rinks", "topic": "recreation" }))
        .await
        .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["message"], MSG_NO_HITS);
    }

    #[tokio::test]
    async fn research_search_failure() {
        let out = research_tool(Some(CannedSearch {
            hits: vec![],
            scraped: vec![],
            fail_search: true,
        }))
        .execute(&json!({ "query": "clinics", "topic": "healthcare" }))
        .await
        .unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], MSG_FAILED);
    }

    #[tokio::test]
    async fn research_rejects_unknown_topic() {
        let err = research_tool(None)
            .execute(&json!({ "query": "x", "topic": "nightlife" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { ref field, .. } if field == "topic"));
    }
}
