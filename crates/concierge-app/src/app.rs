// Request handling shared by every connection.
//
// `AppContext` owns the immutable repositories, the tool registry and the
// model client. It turns one browser request into one or more response
// frames.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use concierge_core::config::Config;
use concierge_core::contact::{submit_contact_form, ContactForm, ContactFormState};
use concierge_core::filter::{FieldError, ListingFilters, SortOption};
use concierge_core::format::{
    format_address, format_bed_bath, format_phone, format_price, format_square_feet,
    truncate_text,
};
use concierge_core::listing::Listing;
use concierge_core::repository::ListingRepository;
use concierge_core::site::{About, ContactInfo, MlsInfo, SiteAgent, SiteFeature, SiteRepository};
use concierge_llm::{ChatMessage, ChatModel, LlmClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat::{run_chat, ChatEvent, ChatSettings};
use crate::prompt::system_prompt;
use crate::search::{ExternalSearchSettings, FirecrawlClient, SearchProvider};
use crate::tools::ToolRegistry;

/// Number of same-city listings returned with a listing detail.
const SIMILAR_LISTINGS: usize = 3;

/// Home-page featured listings when the request names no count.
const DEFAULT_FEATURED: usize = 6;

/// Characters of description kept in a listing card summary.
const SUMMARY_CHARS: usize = 160;

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

/// A browser request, one per WebSocket text frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Chat {
        messages: Vec<ChatMessage>,
    },
    /// Either structured `filters` + `sort`, or a raw search-page `query`
    /// string (`minPrice=...&beds=3%2B&sort=price-asc`).
    Search {
        #[serde(default)]
        filters: Option<ListingFilters>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        sort: Option<SortOption>,
    },
    Listing {
        id: String,
    },
    Featured {
        #[serde(default)]
        count: Option<usize>,
    },
    Site,
    Agents,
    Agent {
        slug: String,
    },
    Contact {
        form: ContactForm,
    },
}

/// Display strings sent alongside each listing record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDisplay {
    pub price: String,
    pub bed_bath: String,
    pub square_feet: String,
    pub address: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_phone: Option<String>,
}

/// A listing record with its display strings under `display`.
#[derive(Debug, Serialize)]
pub struct ListingCard<'a> {
    #[serde(flatten)]
    pub listing: &'a Listing,
    pub display: ListingDisplay,
}

impl<'a> From<&'a Listing> for ListingCard<'a> {
    fn from(listing: &'a Listing) -> Self {
        Self {
            listing,
            display: ListingDisplay {
                price: format_price(listing.price),
                bed_bath: format_bed_bath(listing.bedrooms, listing.bathrooms),
                square_feet: format_square_feet(listing.square_feet),
                address: format_address(&listing.address),
                summary: truncate_text(&listing.description, SUMMARY_CHARS),
                agent_phone: listing.agent.phone.as_deref().map(format_phone),
            },
        }
    }
}

fn cards(listings: Vec<&Listing>) -> Vec<ListingCard<'_>> {
    listings.into_iter().map(ListingCard::from).collect()
}

/// Non-chat response frames.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Listings {
        total: usize,
        listings: Vec<ListingCard<'a>>,
    },
    Listing {
        found: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        listing: Option<ListingCard<'a>>,
        similar: Vec<ListingCard<'a>>,
    },
    Featured {
        listings: Vec<ListingCard<'a>>,
    },
    /// Brokerage profile for the about and contact pages.
    Site {
        site_name: &'a str,
        tagline: &'a str,
        about: &'a About,
        contact: &'a ContactInfo,
        office_phone: String,
        direct_phone: String,
        service_areas: &'a [String],
        property_types: &'a [String],
        features: &'a [SiteFeature],
        #[serde(skip_serializing_if = "Option::is_none")]
        mls_info: Option<&'a MlsInfo>,
    },
    Agents {
        agents: Vec<&'a SiteAgent>,
    },
    Agent {
        found: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<&'a SiteAgent>,
    },
    ContactResult(ContactFormState),
    Error {
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<FieldError>,
    },
}

impl ServerMessage<'_> {
    fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

/// The client's outbound channel is gone; stop serving the connection.
#[derive(Debug, Error)]
#[error("client connection closed")]
pub struct ConnectionClosed;

// ---------------------------------------------------------------------------
// AppContext
// ---------------------------------------------------------------------------

pub struct AppContext {
    listings: Arc<ListingRepository>,
    site: Arc<SiteRepository>,
    registry: ToolRegistry,
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    chat: ChatSettings,
}

impl AppContext {
    pub fn new(
        listings: Arc<ListingRepository>,
        site: Arc<SiteRepository>,
        registry: ToolRegistry,
        model: Arc<dyn ChatModel>,
        system_prompt: String,
        chat: ChatSettings,
    ) -> Self {
        Self {
            listings,
            site,
            registry,
            model,
            system_prompt,
            chat,
        }
    }

    /// Load both datasets (paths relative to `base_dir`) and wire up the
    /// model and search clients from `config`.
    pub fn from_config(config: &Config, base_dir: &Path) -> anyhow::Result<Self> {
        let listings_path = base_dir.join(&config.data.listings_path);
        let listings = Arc::new(
            ListingRepository::load(&listings_path).context("failed to load listings dataset")?,
        );
        let site_path = base_dir.join(&config.data.site_content_path);
        let site = Arc::new(
            SiteRepository::load(&site_path, config.site.lead_agent.clone())
                .context("failed to load site content")?,
        );

        let model = LlmClient::from_config(config);
        match &model {
            LlmClient::Active(_) => info!(model = %config.llm.model, "LLM client initialized"),
            LlmClient::Disabled => warn!("LLM client disabled (no Anthropic API key)"),
        }

        let search: Option<Arc<dyn SearchProvider>> = match FirecrawlClient::from_config(config) {
            Some(client) => {
                info!("external search enabled");
                Some(Arc::new(client))
            }
            None => {
                warn!("external search disabled (no Firecrawl API key)");
                None
            }
        };

        let registry = ToolRegistry::with_default_tools(
            listings.clone(),
            search,
            ExternalSearchSettings::from(&config.search),
            &config.site.area_name,
        );
        let prompt = system_prompt(&listings.brokerage().name, &config.site.area_name);

        Ok(Self::new(
            listings,
            site,
            registry,
            Arc::new(model),
            prompt,
            ChatSettings::from(&config.llm),
        ))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one text frame, writing every response frame to `out`.
    ///
    /// Malformed requests are answered with an `error` frame. The only
    /// failure is a closed `out` channel.
    pub async fn handle_frame(
        &self,
        text: &str,
        out: &mpsc::Sender<String>,
    ) -> Result<(), ConnectionClosed> {
        let request: ClientRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                debug!("rejecting malformed request: {e}");
                return send(out, &ServerMessage::error(format!("invalid request: {e}"))).await;
            }
        };

        match request {
            ClientRequest::Chat { messages } => self.handle_chat(messages, out).await,
            ClientRequest::Search {
                filters,
                query,
                sort,
            } => send(out, &self.search(filters, query.as_deref(), sort)).await,
            ClientRequest::Listing { id } => send(out, &self.listing(&id)).await,
            ClientRequest::Featured { count } => {
                let featured = self.listings.featured(count.unwrap_or(DEFAULT_FEATURED));
                send(
                    out,
                    &ServerMessage::Featured {
                        listings: cards(featured),
                    },
                )
                .await
            }
            ClientRequest::Site => send(out, &self.site_profile()).await,
            ClientRequest::Agents => {
                let agents = self.site.agents();
                send(out, &ServerMessage::Agents { agents }).await
            }
            ClientRequest::Agent { slug } => {
                let agent = self.site.agent_by_slug(&slug);
                send(
                    out,
                    &ServerMessage::Agent {
                        found: agent.is_some(),
                        agent,
                    },
                )
                .await
            }
            ClientRequest::Contact { form } => {
                send(out, &ServerMessage::ContactResult(submit_contact_form(&form))).await
            }
        }
    }

    fn search(
        &self,
        filters: Option<ListingFilters>,
        query: Option<&str>,
        sort: Option<SortOption>,
    ) -> ServerMessage<'_> {
        let (filters, sort) = match query {
            Some(query) => {
                let (parsed, parsed_sort) = ListingFilters::from_query_string(query);
                (parsed, sort.or(parsed_sort))
            }
            None => (filters.unwrap_or_default(), Some(sort.unwrap_or_default())),
        };

        if let Err(errors) = filters.validate() {
            return ServerMessage::Error {
                message: "invalid search filters".to_string(),
                errors,
            };
        }

        let listings = self.listings.search(&filters, sort);
        debug!(results = listings.len(), ?sort, "listing search");
        ServerMessage::Listings {
            total: listings.len(),
            listings: cards(listings),
        }
    }

    fn listing(&self, id: &str) -> ServerMessage<'_> {
        match self.listings.get_by_id(id) {
            Some(listing) => ServerMessage::Listing {
                found: true,
                listing: Some(ListingCard::from(listing)),
                similar: cards(self.listings.same_city(listing, SIMILAR_LISTINGS)),
            },
            None => ServerMessage::Listing {
                found: false,
                listing: None,
                similar: Vec::new(),
            },
        }
    }

    fn site_profile(&self) -> ServerMessage<'_> {
        let content = self.site.content();
        ServerMessage::Site {
            site_name: &content.site_name,
            tagline: &content.tagline,
            about: &content.about,
            contact: &content.contact,
            office_phone: format_phone(&content.contact.office_phone),
            direct_phone: format_phone(&content.contact.direct_phone),
            service_areas: self.site.service_areas(),
            property_types: &content.property_types,
            features: &content.features,
            mls_info: content.mls_info.as_ref(),
        }
    }

    /// Run the chat loop, serializing its events onto `out` as they arrive.
    async fn handle_chat(
        &self,
        messages: Vec<ChatMessage>,
        out: &mpsc::Sender<String>,
    ) -> Result<(), ConnectionClosed> {
        let (tx, mut rx) = mpsc::channel::<ChatEvent>(64);

        let chat = async move {
            run_chat(
                self.model.as_ref(),
                &self.registry,
                &self.system_prompt,
                messages,
                &self.chat,
                &tx,
            )
            .await;
        };
        // Owns `rx` so a dead client drops it and unblocks the chat loop.
        let forward = async move {
            while let Some(event) = rx.recv().await {
                send(out, &event).await?;
            }
            Ok::<(), ConnectionClosed>(())
        };

        let ((), forwarded) = tokio::join!(chat, forward);
        forwarded
    }
}

/// Serialize `message` and queue it for the client.
async fn send<T: Serialize>(out: &mpsc::Sender<String>, message: &T) -> Result<(), ConnectionClosed> {
    let frame = match serde_json::to_string(message) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("failed to serialize response: {e}");
            return Ok(());
        }
    };
    out.send(frame).await.map_err(|_| ConnectionClosed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_parse_by_type() {
        let req: ClientRequest = serde_json::from_str(r#"{"type":"agents"}"#).unwrap();
        assert_eq!(req, ClientRequest::Agents);

        let req: ClientRequest =
            serde_json::from_str(r#"{"type":"search","filters":{"minBeds":3},"sort":"price-asc"}"#)
                .unwrap();
        assert_eq!(
            req,
            ClientRequest::Search {
                filters: Some(ListingFilters {
                    min_beds: Some(3),
                    ..ListingFilters::default()
                }),
                query: None,
                sort: Some(SortOption::PriceAsc),
            }
        );

        let req: ClientRequest = serde_json::from_str(
            r#"{"type":"chat","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            ClientRequest::Chat {
                messages: vec![ChatMessage::user("hi")]
            }
        );
    }

    #[test]
    fn featured_count_is_optional() {
        let req: ClientRequest = serde_json::from_str(r#"{"type":"featured"}"#).unwrap();
        assert_eq!(req, ClientRequest::Featured { count: None });
        let req: ClientRequest =
            serde_json::from_str(r#"{"type":"featured","count":2}"#).unwrap();
        assert_eq!(req, ClientRequest::Featured { count: Some(2) });
        let req: ClientRequest = serde_json::from_str(r#"{"type":"site"}"#).unwrap();
        assert_eq!(req, ClientRequest::Site);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientRequest>(r#"{"type":"delete_all"}"#).is_err());
    }

    #[test]
    fn error_frame_omits_empty_field_errors() {
        let v = serde_json::to_value(ServerMessage::error("nope")).unwrap();
        assert_eq!(v, serde_json::json!({ "type": "error", "message": "nope" }));
    }
}
