//! PostgREST client for the bookmarks table.

use crate::{AccessTokenProvider, Bookmark, BookmarkBackend, NewBookmark, SyncError, SyncResult};
use async_trait::async_trait;
use linkvault_config_and_utils::Config;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, error};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Data API client; every call carries the publishable key and the
/// caller's bearer token so row-level policies apply.
#[derive(Clone)]
pub struct SupabaseRestClient {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
    table: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl SupabaseRestClient {
    pub fn new(
        api_url: impl Into<String>,
        publishable_key: impl Into<String>,
        table: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
            table: table.into(),
            tokens,
        }
    }

    pub fn from_config(config: &Config, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self::new(
            config.api_base(),
            &config.supabase_publishable_key,
            &config.bookmarks_table,
            tokens,
        )
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.api_url, self.table)
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> SyncResult<reqwest::RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(request
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", token)))
    }

    async fn check(response: reqwest::Response, action: &str) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        error!(status = %status, action, body_summary = %body_summary, "data API request failed");
        Err(SyncError::Api {
            status: status.as_u16(),
            message: format!("Failed to {} ({})", action, body_summary),
        })
    }
}

#[async_trait]
impl BookmarkBackend for SupabaseRestClient {
    async fn select_by_owner(&self, owner_id: &str) -> SyncResult<Vec<Bookmark>> {
        let owner_filter = format!("eq.{}", owner_id);
        let request = self.http_client.get(self.rest_url()).query(&[
            ("select", "*"),
            ("user_id", owner_filter.as_str()),
            ("order", "created_at.desc"),
        ]);

        let response = self
            .authorized(request)
            .await?
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check(response, "list bookmarks").await?;

        let bookmarks: Vec<Bookmark> = response.json().await?;
        debug!(count = bookmarks.len(), "fetched bookmarks");
        Ok(bookmarks)
    }

    async fn insert(&self, bookmark: &NewBookmark) -> SyncResult<()> {
        let request = self.http_client.post(self.rest_url()).json(bookmark);
        let response = self
            .authorized(request)
            .await?
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        Self::check(response, "add bookmark").await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> SyncResult<()> {
        let id_filter = format!("eq.{}", id);
        let request = self
            .http_client
            .delete(self.rest_url())
            .query(&[("id", id_filter.as_str())]);
        let response = self.authorized(request).await?.send().await?;
        Self::check(response, "delete bookmark").await?;
        Ok(())
    }
}
