//! REST client for the diary entries endpoint and the backend seam the
//! entry store talks to.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ApiOptions;
use crate::dates;

mod error;

pub use error::ApiError;

/// One diary record as served by `/api/entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub entry_date: String,
    pub entry_time: String,
    pub description: String,
}

impl Entry {
    /// Grouping key: the `YYYY-MM-DD` prefix of `entry_date`.
    pub fn date_key(&self) -> &str {
        dates::date_key(&self.entry_date)
    }

    /// Hour and minute, as shown and edited.
    pub fn time_label(&self) -> &str {
        dates::time_label(&self.entry_time)
    }
}

/// Request body for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub date: String,
    pub time: String,
    pub description: String,
}

impl NewEntry {
    /// Update payload for an edited entry: date key, `HH:MM`, description.
    pub fn from_draft(entry: &Entry) -> Self {
        Self {
            date: entry.date_key().to_string(),
            time: entry.time_label().to_string(),
            description: entry.description.clone(),
        }
    }
}

/// Storage the entry store reads from and writes to.
///
/// Implemented by [`ApiClient`] for a remote server and by
/// [`crate::storage::LocalBackend`] for the on-disk database.
#[allow(async_fn_in_trait)]
pub trait EntryBackend {
    async fn fetch_entries_by_month(&self, month: &str) -> Result<Vec<Entry>, ApiError>;
    async fn add_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError>;
    async fn update_entry(&self, id: i64, entry: &NewEntry) -> Result<Entry, ApiError>;
    async fn delete_entry(&self, id: i64) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(options: &ApiOptions) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut builder = Client::builder().default_headers(headers);
        if options.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(options.timeout_secs));
        }
        let client = builder.build().map_err(ApiError::Transport)?;
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/api/entries", self.base_url)
    }

    async fn call<T, F>(&self, operation: &'static str, request: F) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        F: Future<Output = reqwest::Result<Response>>,
    {
        let outcome = match request.await {
            Ok(response) => handle_response(response).await,
            Err(err) => Err(ApiError::Transport(err)),
        };
        if let Err(err) = &outcome {
            error!(operation, %err, "diary api request failed");
        }
        outcome
    }
}

impl EntryBackend for ApiClient {
    async fn fetch_entries_by_month(&self, month: &str) -> Result<Vec<Entry>, ApiError> {
        debug!(month, "fetching entries");
        let request = self
            .client
            .get(self.endpoint())
            .query(&[("month", month)])
            .send();
        let entries: Option<Vec<Entry>> = self.call("fetch entries", request).await?;
        Ok(entries.unwrap_or_default())
    }

    async fn add_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError> {
        debug!(date = %entry.date, time = %entry.time, "adding entry");
        let request = self.client.post(self.endpoint()).json(entry).send();
        self.call("add entry", request)
            .await?
            .ok_or(ApiError::EmptyBody)
    }

    async fn update_entry(&self, id: i64, entry: &NewEntry) -> Result<Entry, ApiError> {
        debug!(id, "updating entry");
        let request = self
            .client
            .put(self.endpoint())
            .query(&[("id", id)])
            .json(entry)
            .send();
        self.call("update entry", request)
            .await?
            .ok_or(ApiError::EmptyBody)
    }

    async fn delete_entry(&self, id: i64) -> Result<(), ApiError> {
        debug!(id, "deleting entry");
        let request = self
            .client
            .delete(self.endpoint())
            .query(&[("id", id)])
            .send();
        let _: Option<serde_json::Value> = self.call("delete entry", request).await?;
        Ok(())
    }
}

/// Uniform response handling: non-success statuses become
/// [`ApiError::Status`] carrying the body's `message` when present, 204
/// yields `None` without touching the body.
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let body = response.bytes().await.map_err(ApiError::Transport)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(ApiError::Decode)
}
