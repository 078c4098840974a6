// Integration tests for the listing concierge.
//
// These drive the public API end to end: WebSocket request handling over the
// fixture datasets, the chat loop with a scripted model calling real tools,
// the external listing pipeline under scrape timeouts, and a live socket
// round trip.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use concierge_app::app::AppContext;
use concierge_app::chat::ChatSettings;
use concierge_app::prompt::system_prompt;
use concierge_app::search::{
    find_external_listings, ExternalSearchSettings, SearchError, SearchHit, SearchProvider,
};
use concierge_app::server;
use concierge_app::tools::ToolRegistry;
use concierge_core::repository::ListingRepository;
use concierge_core::site::SiteRepository;
use concierge_llm::{ChatMessage, ChatModel, LlmClient, LlmEvent, ToolDefinition};
use futures_util::{stream, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory (relative to the crate root, the cwd for `cargo test`).
const FIXTURES: &str = "tests/fixtures";

const AREA: &str = "Sioux City, Iowa";

fn listings() -> Arc<ListingRepository> {
    Arc::new(ListingRepository::load(&Path::new(FIXTURES).join("listings.json")).unwrap())
}

fn site() -> Arc<SiteRepository> {
    Arc::new(
        SiteRepository::load(
            &Path::new(FIXTURES).join("site-content.json"),
            Some("Haley Markle".into()),
        )
        .unwrap(),
    )
}

fn search_settings() -> ExternalSearchSettings {
    ExternalSearchSettings {
        search_limit: 5,
        max_scrape_urls: 2,
        scrape_timeout: Duration::from_secs(20),
        default_location: "Sioux City Iowa".into(),
    }
}

fn context(model: Arc<dyn ChatModel>, search: Option<Arc<dyn SearchProvider>>) -> AppContext {
    let listings = listings();
    let registry =
        ToolRegistry::with_default_tools(listings.clone(), search, search_settings(), AREA);
    let prompt = system_prompt(&listings.brokerage().name, AREA);
    AppContext::new(
        listings,
        site(),
        registry,
        model,
        prompt,
        ChatSettings {
            max_steps: 5,
            max_tokens: 1024,
        },
    )
}

fn offline_context() -> AppContext {
    context(Arc::new(LlmClient::Disabled), None)
}

/// Feed `frames` through the connection handler and collect every response.
async fn exchange(ctx: &AppContext, frames: &[Value]) -> Vec<Value> {
    let messages: Vec<Result<Message, tokio_tungstenite::tungstenite::Error>> = frames
        .iter()
        .map(|f| Ok(Message::Text(f.to_string().into())))
        .collect();
    let (tx, mut rx) = mpsc::channel(256);
    server::process_message_stream(stream::iter(messages), ctx, &tx, "test").await;
    drop(tx);

    let mut out = Vec::new();
    while let Some(frame) = rx.recv().await {
        out.push(serde_json::from_str(&frame).unwrap());
    }
    out
}

fn ids(frame: &Value) -> Vec<&str> {
    frame["listings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect()
}

/// Plays back one scripted turn per call and records the conversations it saw.
struct ScriptedModel {
    turns: Mutex<Vec<Vec<LlmEvent>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn new(mut turns: Vec<Vec<LlmEvent>>) -> Self {
        turns.reverse();
        Self {
            turns: Mutex::new(turns),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn stream_turn(
        &self,
        _system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        _max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
    ) -> anyhow::Result<()> {
        assert_eq!(tools.len(), 7, "every tool is advertised on every turn");
        self.seen.lock().unwrap().push(messages.to_vec());
        let turn = self.turns.lock().unwrap().pop().unwrap_or_default();
        for event in turn {
            let _ = tx.send(event).await;
        }
        Ok(())
    }
}

fn complete(reason: &str) -> LlmEvent {
    LlmEvent::Complete {
        stop_reason: Some(reason.into()),
        input_tokens: 100,
        output_tokens: 20,
    }
}

// ===========================================================================
// Listing search and detail requests
// ===========================================================================

#[tokio::test]
async fn search_with_price_and_bed_window() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[json!({
            "type": "search",
            "filters": { "minPrice": 300000, "maxPrice": 500000, "minBeds": 3 }
        })],
    )
    .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["type"], "listings");
    assert_eq!(out[0]["total"], 2);
    // Default sort: most days on market first.
    assert_eq!(ids(&out[0]), vec!["cb-1002", "cb-1005"]);
}

#[tokio::test]
async fn search_from_query_string() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[json!({ "type": "search", "query": "beds=3%2B&sort=price-desc" })],
    )
    .await;
    assert_eq!(ids(&out[0]), vec!["cb-1003", "cb-1005", "cb-1002"]);
}

#[tokio::test]
async fn unrecognized_sort_keeps_dataset_order() {
    let ctx = offline_context();
    let out = exchange(&ctx, &[json!({ "type": "search", "query": "sort=cheapest" })]).await;
    assert_eq!(
        ids(&out[0]),
        vec!["cb-1001", "cb-1002", "cb-1003", "cb-1004", "cb-1005", "cb-1006"]
    );
}

#[tokio::test]
async fn search_without_filters_returns_everything() {
    let ctx = offline_context();
    let out = exchange(&ctx, &[json!({ "type": "search" })]).await;
    assert_eq!(out[0]["total"], 6);
}

#[tokio::test]
async fn inverted_price_range_is_a_field_error() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[json!({ "type": "search", "filters": { "minPrice": 500000, "maxPrice": 100000 } })],
    )
    .await;
    assert_eq!(out[0]["type"], "error");
    assert_eq!(out[0]["errors"][0]["field"], "maxPrice");
}

#[tokio::test]
async fn listing_detail_and_not_found() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[
            json!({ "type": "listing", "id": "cb-1001" }),
            json!({ "type": "listing", "id": "cb-9999" }),
        ],
    )
    .await;

    assert_eq!(out[0]["found"], true);
    assert_eq!(out[0]["listing"]["address"]["street"], "1520 Morningside Ave");
    assert_eq!(out[0]["listing"]["display"]["price"], "$250,000");
    // Same city only: cb-1003 shares the property type but is in Dakota Dunes.
    let similar: Vec<&str> = out[0]["similar"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert_eq!(similar, vec!["cb-1002", "cb-1004"]);
    assert!(out[0]["similar"]
        .as_array()
        .unwrap()
        .iter()
        .all(|l| l["address"]["city"] == "Sioux City"));

    assert_eq!(out[1], json!({ "type": "listing", "found": false, "similar": [] }));
}

#[tokio::test]
async fn featured_listings_are_most_expensive_first_with_display_strings() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[
            json!({ "type": "featured", "count": 2 }),
            json!({ "type": "featured" }),
        ],
    )
    .await;

    assert_eq!(out[0]["type"], "featured");
    assert_eq!(ids(&out[0]), vec!["cb-1003", "cb-1005"]);
    let display = &out[0]["listings"][0]["display"];
    assert_eq!(display["price"], "$600,000");
    assert_eq!(display["bedBath"], "4 beds \u{2022} 3.5 baths");
    assert_eq!(display["squareFeet"], "3,400 sq ft");
    assert_eq!(display["address"], "210 River Dr, Dakota Dunes, SD 57049");
    assert_eq!(display["agentPhone"], "(712) 555-0142");

    // Default count covers the whole six-listing fixture.
    assert_eq!(out[1]["listings"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn listing_cards_normalize_agent_phone_and_omit_missing_ones() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[
            json!({ "type": "listing", "id": "cb-1004" }),
            json!({ "type": "listing", "id": "cb-1002" }),
        ],
    )
    .await;
    assert_eq!(out[0]["listing"]["display"]["agentPhone"], "(712) 555-0177");
    assert!(out[1]["listing"]["display"].get("agentPhone").is_none());
    assert_eq!(out[1]["listing"]["display"]["squareFeet"], "1,850 sq ft");
}

// ===========================================================================
// Agents, site profile and contact form
// ===========================================================================

#[tokio::test]
async fn agents_list_puts_lead_agent_first() {
    let ctx = offline_context();
    let out = exchange(&ctx, &[json!({ "type": "agents" })]).await;
    let names: Vec<&str> = out[0]["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Haley Markle", "Jordan Reyes", "Morgan Ellis"]);
}

#[tokio::test]
async fn agent_lookup_by_explicit_and_generated_slug() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[
            json!({ "type": "agent", "slug": "haley" }),
            json!({ "type": "agent", "slug": "morgan-ellis" }),
            json!({ "type": "agent", "slug": "nobody" }),
        ],
    )
    .await;
    assert_eq!(out[0]["agent"]["name"], "Haley Markle");
    assert_eq!(out[1]["agent"]["name"], "Morgan Ellis");
    assert_eq!(out[2], json!({ "type": "agent", "found": false }));
}

#[tokio::test]
async fn site_profile_lists_service_areas_and_formatted_phones() {
    let ctx = offline_context();
    let out = exchange(&ctx, &[json!({ "type": "site" })]).await;

    assert_eq!(out[0]["type"], "site");
    assert_eq!(out[0]["site_name"], "Coldwell Banker Associated Brokers Realty");
    assert_eq!(out[0]["office_phone"], "(712) 555-0100");
    assert_eq!(out[0]["direct_phone"], "(712) 555-0142");
    assert_eq!(out[0]["contact"]["address"]["city"], "Sioux City");
    let areas = out[0]["service_areas"].as_array().unwrap();
    assert_eq!(areas.len(), 6);
    assert_eq!(areas[0], "Sioux City");
    assert!(out[0].get("agents").is_none());
}

#[tokio::test]
async fn contact_form_validation_and_success() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[
            json!({ "type": "contact", "form": {
                "name": "A", "email": "not-an-email", "subject": "", "message": "short"
            }}),
            json!({ "type": "contact", "form": {
                "name": "Pat Buyer", "email": "pat@example.com", "subject": "Showing",
                "property": "cb-1002", "message": "I'd like to tour this weekend."
            }}),
        ],
    )
    .await;

    assert_eq!(out[0]["type"], "contact_result");
    assert_eq!(out[0]["success"], false);
    assert_eq!(out[0]["message"], "Please fix the errors below");
    for field in ["name", "email", "subject", "message"] {
        assert!(out[0]["errors"].get(field).is_some(), "missing error for {field}");
    }

    assert_eq!(out[1]["success"], true);
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[json!({ "type": "teleport" }), json!("not an object"), json!({ "type": "agents" })],
    )
    .await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["type"], "error");
    assert_eq!(out[1]["type"], "error");
    assert_eq!(out[2]["type"], "agents");
}

// ===========================================================================
// Chat
// ===========================================================================

#[tokio::test]
async fn chat_runs_listing_search_tool_between_turns() {
    let model = Arc::new(ScriptedModel::new(vec![
        vec![
            LlmEvent::TextDelta {
                text: "Let me look in Le Mars.".into(),
            },
            LlmEvent::ToolCall {
                id: "toolu_1".into(),
                name: "searchListings".into(),
                input: json!({ "city": "Le Mars" }),
            },
            complete("tool_use"),
        ],
        vec![
            LlmEvent::TextDelta {
                text: "Here's a great option!".into(),
            },
            complete("end_turn"),
        ],
    ]));
    let ctx = context(model.clone(), None);

    let out = exchange(
        &ctx,
        &[json!({ "type": "chat", "messages": [
            { "role": "user", "content": "Anything in Le Mars?" }
        ]})],
    )
    .await;

    let types: Vec<&str> = out.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["text_delta", "tool_call", "tool_result", "text_delta", "finish"]
    );
    assert_eq!(out[2]["name"], "searchListings");
    assert_eq!(out[2]["is_error"], false);
    assert_eq!(out[2]["output"]["totalFound"], 1);
    assert_eq!(out[2]["output"]["listings"][0]["id"], "cb-1005");
    assert_eq!(out[4]["steps"], 2);

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].len(), 3, "user, assistant tool call, tool result");
}

#[tokio::test]
async fn chat_without_api_key_reports_error() {
    let ctx = offline_context();
    let out = exchange(
        &ctx,
        &[json!({ "type": "chat", "messages": [{ "role": "user", "content": "hi" }] })],
    )
    .await;
    assert_eq!(out, vec![json!({ "type": "error", "message": "LLM not configured" })]);
}

#[tokio::test]
async fn chat_external_search_without_provider_degrades() {
    let model = Arc::new(ScriptedModel::new(vec![
        vec![
            LlmEvent::ToolCall {
                id: "toolu_x".into(),
                name: "searchExternalListings".into(),
                input: json!({ "query": "waterfront" }),
            },
            complete("tool_use"),
        ],
        vec![complete("end_turn")],
    ]));
    let ctx = context(model, None);
    let out = exchange(
        &ctx,
        &[json!({ "type": "chat", "messages": [{ "role": "user", "content": "waterfront?" }] })],
    )
    .await;

    let result = out.iter().find(|f| f["type"] == "tool_result").unwrap();
    assert_eq!(
        result["output"],
        json!({ "success": false, "totalFound": 0, "listings": [] })
    );
    assert_eq!(out.last().unwrap()["type"], "finish");
}

// ===========================================================================
// External listing pipeline
// ===========================================================================

/// Two result pages; scraping `slow_url` never completes.
struct TwoPages {
    slow_url: Option<&'static str>,
}

#[async_trait]
impl SearchProvider for TwoPages {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(["https://one.example", "https://two.example", "https://three.example"]
            .into_iter()
            .map(|url| SearchHit {
                url: Some(url.into()),
                ..SearchHit::default()
            })
            .collect())
    }

    async fn scrape_listings(&self, url: &str) -> Result<Vec<Value>, SearchError> {
        if Some(url) == self.slow_url {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        Ok(match url {
            "https://one.example" => vec![
                json!({ "address": "501 Nebraska St, Sioux City, IA 51101", "price": "$199,000", "bedrooms": 16 }),
                json!({ "address": "22 Buckeye Ave, Sioux City, IA 51106", "price": "$240,000", "imageUrl": "https://cdn.example/spacer.gif" }),
            ],
            "https://two.example" => vec![
                json!({ "address": "22  BUCKEYE AVE, Sioux City, IA 51106", "price": "$240,000" }),
                json!({ "address": "3100 Dace Ave, Sioux City, IA 51105", "price": "$180,000", "bathrooms": 1.5 }),
            ],
            _ => vec![json!({ "address": "9 Never Scraped Rd, Sioux City, IA 51103" })],
        })
    }
}

#[tokio::test]
async fn external_listings_are_sanitized_and_deduped_across_pages() {
    let provider = TwoPages { slow_url: None };
    let listings = find_external_listings(&provider, "homes Sioux City Iowa home for sale", &search_settings())
        .await
        .unwrap();

    let addresses: Vec<&str> = listings.iter().map(|l| l.address.as_str()).collect();
    assert_eq!(
        addresses,
        vec![
            "501 Nebraska St, Sioux City, IA 51101",
            "22 Buckeye Ave, Sioux City, IA 51106",
            "3100 Dace Ave, Sioux City, IA 51105",
        ]
    );
    assert_eq!(listings[0].bedrooms, None);
    assert_eq!(listings[1].image_url, None);
    assert_eq!(listings[2].bathrooms, Some(1.5));
}

#[tokio::test(start_paused = true)]
async fn timed_out_scrape_contributes_nothing() {
    let provider = TwoPages {
        slow_url: Some("https://one.example"),
    };
    let started = tokio::time::Instant::now();
    let listings = find_external_listings(&provider, "homes", &search_settings())
        .await
        .unwrap();

    let addresses: Vec<&str> = listings.iter().map(|l| l.address.as_str()).collect();
    assert_eq!(
        addresses,
        vec![
            "22 BUCKEYE AVE, Sioux City, IA 51106",
            "3100 Dace Ave, Sioux City, IA 51105",
        ]
    );
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert!(started.elapsed() < Duration::from_secs(600));
}

// ===========================================================================
// Live socket
// ===========================================================================

#[tokio::test]
async fn websocket_round_trip() {
    let listener = server::bind(0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_task = tokio::spawn(server::run(listener, Arc::new(offline_context())));

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    ws.send(Message::Text(
        json!({ "type": "listing", "id": "cb-1003" }).to_string().into(),
    ))
    .await
    .unwrap();

    let reply = loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => break serde_json::from_str::<Value>(text.as_str()).unwrap(),
            _ => continue,
        }
    };
    assert_eq!(reply["type"], "listing");
    assert_eq!(reply["listing"]["address"]["city"], "Dakota Dunes");

    ws.close(None).await.unwrap();
    server_task.abort();
}
