//! Events provider client
//!
//! Thin REST client for the Humanitix API behind the [`EventsProvider`] trait
//! so the event tools can be exercised against canned data.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::core::{ChicoError, Config, Result};

/// An event as returned by the provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub event_location: Option<EventLocation>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub total_capacity: Option<i64>,
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLocation {
    #[serde(default)]
    pub venue_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TicketType {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<serde_json::Value>,
}

/// Source of event data
#[async_trait]
pub trait EventsProvider: Send + Sync {
    /// All events visible to the configured account
    async fn list_events(&self) -> Result<Vec<Event>>;

    /// Number of orders placed for an event, if the provider can tell
    async fn order_count(&self, event_id: &str) -> Result<Option<usize>>;
}

/// Humanitix REST API client
#[derive(Clone)]
pub struct HumanitixClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HumanitixClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.events.timeout_secs))
            .build()
            .map_err(|e| ChicoError::config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.events.base_url)
            .map_err(|e| ChicoError::config(format!("Invalid events base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.events.api_key.clone(),
        })
    }

    /// Whether an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ChicoError::events("HUMANITIX_API_KEY is not set"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ChicoError::events(format!("Invalid endpoint '{}': {}", path, e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "events request");

        let response = self
            .client
            .get(url)
            .header("x-api-key", self.api_key()?)
            .header("Content-Type", "application/json")
            .query(&[("page", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChicoError::events(format!(
                "Humanitix API error ({}): {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl EventsProvider for HumanitixClient {
    async fn list_events(&self) -> Result<Vec<Event>> {
        let page: EventsPage = self.get_json(self.endpoint("/v1/events")?).await?;
        Ok(page.events)
    }

    async fn order_count(&self, event_id: &str) -> Result<Option<usize>> {
        let url = self.endpoint(&format!("/v1/events/{}/orders", event_id))?;
        let page: OrdersPage = self.get_json(url).await?;
        Ok(Some(page.orders.len()))
    }
}
