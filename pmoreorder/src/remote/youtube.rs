//! Client YouTube Data API v3 pour les éléments de playlist
//!
//! Seules deux ressources sont utilisées :
//! - `GET playlistItems` (liste paginée, 1 unité de quota par page) ;
//! - `PUT playlistItems?part=snippet` (déplacement, 50 unités).
//!
//! L'obtention du jeton OAuth n'est pas gérée ici : le jeton est fourni par
//! la configuration.

use super::RemotePlaylist;
use crate::error::RemoteError;
use crate::order::Item;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// URL de base de l'API YouTube Data v3
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

const PAGE_SIZE: &str = "50";

/// Client de l'API YouTube pour une playlist donnée
pub struct YoutubeClient {
    client: Client,
    api_base: String,
    playlist_id: String,
    access_token: String,
}

impl YoutubeClient {
    /// Crée un client pour `playlist_id` authentifié par `access_token`
    pub fn new(
        playlist_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("pmoreorder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            playlist_id: playlist_id.into(),
            access_token: access_token.into(),
        })
    }

    /// Change l'URL de base (tests, proxy)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.api_base, resource)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("YouTube API error ({}): {}", status.as_u16(), body);
        Err(error_from_body(status.as_u16(), &body))
    }
}

#[async_trait]
impl RemotePlaylist for YoutubeClient {
    fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, RemoteError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("part", "snippet,contentDetails"),
                ("playlistId", self.playlist_id.as_str()),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let request = self.client.get(self.url("playlistItems")).query(&params);
            let page: PlaylistItemListResponse = self.send(request).await?.json().await?;

            for resource in page.items {
                // l'élément reste en place pour conserver les positions distantes
                let id = match resource.snippet.resource_id.video_id {
                    Some(video_id) => video_id,
                    None => {
                        warn!(handle = %resource.id, "Playlist item without video id, kept under its handle");
                        resource.id.clone()
                    }
                };
                let mut item = Item::with_handle(id, resource.id);
                item.position = resource.snippet.position.unwrap_or(items.len());
                item.metadata.title = resource.snippet.title;
                item.metadata.published_at = resource
                    .content_details
                    .and_then(|details| details.video_published_at);
                items.push(item);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        items.sort_by_key(|item| item.position);
        debug!(playlist = %self.playlist_id, count = items.len(), "Fetched playlist items");
        Ok(items)
    }

    async fn relocate(
        &self,
        handle: &str,
        item_id: &str,
        position: usize,
    ) -> Result<(), RemoteError> {
        let body = json!({
            "id": handle,
            "snippet": {
                "playlistId": self.playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": item_id,
                },
                "position": position,
            }
        });

        let request = self
            .client
            .put(self.url("playlistItems"))
            .query(&[("part", "snippet")])
            .json(&body);
        self.send(request).await?;
        Ok(())
    }
}

/// Construit l'erreur distante depuis le corps d'erreur standard de Google
fn error_from_body(status: u16, body: &str) -> RemoteError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let reason = parsed
        .as_ref()
        .and_then(|e| e.error.errors.first())
        .and_then(|detail| detail.reason.as_deref());
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.to_string());

    RemoteError::from_status_code(status, reason, message)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItemResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    id: String,
    snippet: Snippet,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    position: Option<usize>,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}
