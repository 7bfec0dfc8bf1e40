pub mod error;

pub use error::{GorseError, Result};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use starfeed_common::{Feedback, Item, ItemPatch, User};

/// Rows-affected acknowledgement returned by store writes.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RowAffected {
    pub row_affected: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsPage {
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<Item>,
}

/// Client for the recommendation store's REST API. Every call carries the
/// API key; non-2xx responses other than 404 surface as typed store
/// errors with status and message.
pub struct Gorse {
    client: reqwest::Client,
    entry_point: String,
    api_key: String,
}

impl Gorse {
    pub fn new(entry_point: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            entry_point: entry_point.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Fetch one catalog record. `Err(GorseError::NotFound)` when absent.
    pub async fn get_item(&self, item_id: &str) -> Result<Item> {
        let url = format!("{}/api/item/{}", self.entry_point, item_id);
        self.send(self.client.get(&url)).await
    }

    pub async fn insert_item(&self, item: &Item) -> Result<RowAffected> {
        let url = format!("{}/api/item", self.entry_point);
        self.send(self.client.post(&url).json(item)).await
    }

    /// Bulk upsert. The store overwrites records with matching ids.
    pub async fn insert_items(&self, items: &[Item]) -> Result<RowAffected> {
        let url = format!("{}/api/items", self.entry_point);
        self.send(self.client.post(&url).json(items)).await
    }

    /// Partial update of an existing record.
    pub async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> Result<RowAffected> {
        let url = format!("{}/api/item/{}", self.entry_point, item_id);
        self.send(self.client.patch(&url).json(patch)).await
    }

    pub async fn delete_item(&self, item_id: &str) -> Result<RowAffected> {
        let url = format!("{}/api/item/{}", self.entry_point, item_id);
        self.send(self.client.delete(&url)).await
    }

    /// Bulk feedback insert. Fire-and-forget: no partial-success
    /// reporting is assumed.
    pub async fn insert_feedback(&self, feedback: &[Feedback]) -> Result<RowAffected> {
        let url = format!("{}/api/feedback", self.entry_point);
        let ack: RowAffected = self.send(self.client.post(&url).json(feedback)).await?;
        debug!(count = feedback.len(), "inserted feedback");
        Ok(ack)
    }

    /// One page of catalog records. An empty returned cursor signals the
    /// end of the catalog.
    pub async fn get_items(&self, n: usize, cursor: &str) -> Result<(Vec<Item>, String)> {
        let url = format!(
            "{}/api/items?n={}&cursor={}",
            self.entry_point, n, cursor
        );
        let page: ItemsPage = self.send(self.client.get(&url)).await?;
        Ok((page.items, page.cursor.unwrap_or_default()))
    }

    pub async fn insert_user(&self, user: &User) -> Result<RowAffected> {
        let url = format!("{}/api/user", self.entry_point);
        self.send(self.client.post(&url).json(user)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(GorseError::NotFound);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GorseError::Api {
                status: status.as_u16(),
                message,
            });
        }
        resp.json()
            .await
            .map_err(|e| GorseError::Parse(e.to_string()))
    }
}
