// Static site content: brokerage profile, agents, service areas.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::format::slugify;
use crate::repository::DataError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct About {
    pub mission: String,
    pub history: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub office_phone: String,
    pub direct_phone: String,
    pub email: String,
    pub address: PostalAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Summary of a listing on an agent's profile. Prices are display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentListing {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baths: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqft: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mls_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAgent {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social: Option<SocialLinks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<Office>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_listings: Vec<AgentListing>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sold_listings: Vec<AgentListing>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specialties: Vec<String>,
}

impl SiteAgent {
    /// Explicit slug from the dataset, or one derived from the name.
    pub fn slug(&self) -> String {
        match &self.slug {
            Some(s) if !s.is_empty() => s.clone(),
            _ => slugify(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteFeature {
    pub name: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlsInfo {
    pub source: String,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteContent {
    pub site_name: String,
    pub tagline: String,
    pub about: About,
    pub contact: ContactInfo,
    #[serde(default)]
    pub agents: Vec<SiteAgent>,
    #[serde(default)]
    pub features: Vec<SiteFeature>,
    #[serde(default)]
    pub service_areas: Vec<String>,
    #[serde(default)]
    pub property_types: Vec<String>,
    #[serde(default)]
    pub search_features: Vec<String>,
    #[serde(default)]
    pub mls_info: Option<MlsInfo>,
}

// ---------------------------------------------------------------------------
// SiteRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SiteRepository {
    content: SiteContent,
    lead_agent: Option<String>,
}

impl SiteRepository {
    /// `lead_agent` names the broker/owner shown first on the agents page.
    pub fn new(content: SiteContent, lead_agent: Option<String>) -> Self {
        Self {
            content,
            lead_agent,
        }
    }

    pub fn load(path: &Path, lead_agent: Option<String>) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path).map_err(|source| DataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content: SiteContent =
            serde_json::from_str(&text).map_err(|source| DataError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            agents = content.agents.len(),
            "loaded site content from {}",
            path.display()
        );
        Ok(Self::new(content, lead_agent))
    }

    pub fn content(&self) -> &SiteContent {
        &self.content
    }

    /// Agents with the lead agent first, everyone else in file order.
    pub fn agents(&self) -> Vec<&SiteAgent> {
        let mut agents: Vec<&SiteAgent> = self.content.agents.iter().collect();
        if let Some(lead) = &self.lead_agent {
            let lead = lead.to_lowercase();
            agents.sort_by_key(|a| !a.name.to_lowercase().contains(&lead));
        }
        agents
    }

    pub fn agent_by_slug(&self, slug: &str) -> Option<&SiteAgent> {
        self.content.agents.iter().find(|a| a.slug() == slug)
    }

    pub fn service_areas(&self) -> &[String] {
        &self.content.service_areas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = r#"{
        "site_name": "Test Realty",
        "tagline": "Home starts here",
        "about": {"mission": "m", "history": "h", "description": "d"},
        "contact": {
            "office_phone": "7125550100", "direct_phone": "7125550101",
            "email": "info@test.example",
            "address": {"street": "1 Main", "city": "Sioux City", "state": "IA", "zip": "51101"}
        },
        "agents": [
            {"name": "Alex Able", "title": "Realtor", "profile_url": "/a"},
            {"name": "Jordan Lead", "title": "Broker/Owner", "profile_url": "/j"},
            {"name": "Casey Custom", "title": "Realtor", "profile_url": "/c", "slug": "casey"}
        ],
        "service_areas": ["Sioux City", "Le Mars"]
    }"#;

    fn repo(lead: Option<&str>) -> SiteRepository {
        SiteRepository::new(
            serde_json::from_str(CONTENT).unwrap(),
            lead.map(str::to_string),
        )
    }

    #[test]
    fn lead_agent_sorted_first_others_keep_order() {
        let names: Vec<_> = repo(Some("jordan lead"))
            .agents()
            .iter()
            .map(|a| a.name.clone())
            .collect();
        assert_eq!(names, vec!["Jordan Lead", "Alex Able", "Casey Custom"]);
    }

    #[test]
    fn without_lead_agent_file_order_is_kept() {
        let names: Vec<_> = repo(None).agents().iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["Alex Able", "Jordan Lead", "Casey Custom"]);
    }

    #[test]
    fn lookup_by_slug() {
        let repo = repo(None);
        assert_eq!(repo.agent_by_slug("jordan-lead").unwrap().name, "Jordan Lead");
        assert_eq!(repo.agent_by_slug("casey").unwrap().name, "Casey Custom");
        assert!(repo.agent_by_slug("casey-custom").is_none());
        assert_eq!(repo.service_areas().len(), 2);
    }
}
