use super::token::TokenStore;
use super::SourceCatalog;
use crate::models::{CollectionRef, CollectionSummary, SourceItem, SourcePage, SourceTrack};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::env;
use std::path::PathBuf;

/// Spotify provider backed by the Spotify Web API. It is only ever read from:
/// playlists and saved tracks are listed, nothing is written.
///
/// Endpoints may be overridden by SPOTIFY_AUTH_BASE and SPOTIFY_API_BASE env
/// vars, or per instance with `with_api_base` / `with_auth_base` (tests).
pub struct SpotifyProvider {
    client: Client,
    tokens: TokenStore,
    api_base: String,
    playlist_page_size: u32,
    liked_page_size: u32,
}

impl SpotifyProvider {
    pub fn new(client_id: String, client_secret: String, db_path: PathBuf) -> Self {
        let token_url = format!("{}/api/token", Self::default_auth_base());
        Self {
            client: Client::new(),
            tokens: TokenStore::new("spotify", client_id, client_secret, db_path, token_url),
            api_base: Self::default_api_base(),
            playlist_page_size: 100,
            liked_page_size: 50,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.tokens
            .set_token_url(format!("{}/api/token", base.trim_end_matches('/')));
        self
    }

    pub fn with_page_sizes(mut self, playlist: u32, liked: u32) -> Self {
        self.playlist_page_size = playlist;
        self.liked_page_size = liked;
        self
    }

    pub fn default_auth_base() -> String {
        env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
    }

    pub fn default_api_base() -> String {
        // include v1 path by default
        env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.has_client_credentials()
    }

    /// GET a JSON document, refreshing the token once on 401 and honoring
    /// `retry-after` on 429 up to three times.
    async fn get_json(&self, url: &str) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let bearer = self.tokens.bearer().await?;
            let resp = self
                .client
                .get(url)
                .header(AUTHORIZATION, &bearer)
                .header(ACCEPT, "application/json")
                .send()
                .await?;
            let status = resp.status();

            if status == StatusCode::UNAUTHORIZED && attempt == 1 {
                warn!("Got 401 from Spotify for {}; attempting token refresh", url);
                self.tokens.force_refresh().await?;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS && attempt <= 3 {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                debug!("Spotify rate limited; sleeping {}s", retry_after + 1);
                tokio::time::sleep(std::time::Duration::from_secs(retry_after + 1)).await;
                continue;
            }

            if !status.is_success() {
                let txt = resp.text().await.unwrap_or_default();
                return Err(anyhow!("spotify GET {} failed: {} => {}", url, status, txt));
            }
            return Ok(resp.json().await?);
        }
    }

    fn first_page_url(&self, collection: &CollectionRef) -> String {
        match collection {
            CollectionRef::Playlist(id) => format!(
                "{}/playlists/{}/tracks?offset=0&limit={}",
                self.api_base,
                urlencoding::encode(id),
                self.playlist_page_size
            ),
            CollectionRef::Liked => format!(
                "{}/me/tracks?offset=0&limit={}",
                self.api_base, self.liked_page_size
            ),
        }
    }

    fn absolute(&self, next: &str) -> String {
        if next.starts_with("http") {
            next.to_string()
        } else {
            format!("{}{}", self.api_base, next)
        }
    }

    /// Display name of the authenticated user (falls back to the user id).
    pub async fn current_user_display_name(&self) -> Result<String> {
        let j = self.get_json(&format!("{}/me", self.api_base)).await?;
        j["display_name"]
            .as_str()
            .filter(|s| !s.is_empty())
            .or_else(|| j["id"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("no id in /me response"))
    }
}

/// Map one entry of a playlist-tracks or saved-tracks page. Removed tracks
/// come back as `"track": null` and map to an item without a track.
fn parse_item(it: &Value) -> SourceItem {
    let t = &it["track"];
    let uri = match t["uri"].as_str() {
        Some(u) if t.is_object() => u.to_string(),
        _ => return SourceItem { track: None },
    };
    let artists = t["artists"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|x| x["name"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    SourceItem {
        track: Some(SourceTrack {
            artists,
            name: t["name"].as_str().unwrap_or("").to_string(),
            uri,
        }),
    }
}

pub(crate) fn parse_page(j: &Value) -> SourcePage {
    SourcePage {
        items: j["items"]
            .as_array()
            .map(|a| a.iter().map(parse_item).collect())
            .unwrap_or_default(),
        next: j["next"].as_str().filter(|s| !s.is_empty()).map(|s| s.to_string()),
        total: j["total"].as_u64(),
    }
}

#[async_trait]
impl SourceCatalog for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn fetch_page(
        &self,
        collection: &CollectionRef,
        cursor: Option<&str>,
    ) -> Result<SourcePage> {
        let url = match cursor {
            Some(next) => self.absolute(next),
            None => self.first_page_url(collection),
        };
        debug!("Fetching Spotify page {}", url);
        let j = self.get_json(&url).await?;
        Ok(parse_page(&j))
    }

    async fn liked_total(&self) -> Result<u64> {
        let url = format!("{}/me/tracks?limit=1", self.api_base);
        let j = self.get_json(&url).await?;
        j["total"]
            .as_u64()
            .ok_or_else(|| anyhow!("no total in saved tracks response"))
    }

    async fn list_playlists(&self) -> Result<Vec<CollectionSummary>> {
        let mut playlists = Vec::new();
        let mut next_url = Some(format!("{}/me/playlists?limit=50", self.api_base));
        while let Some(url) = next_url {
            let j = self.get_json(&url).await?;
            if let Some(items) = j["items"].as_array() {
                for pl in items {
                    let id = match pl["id"].as_str() {
                        Some(id) => id.to_string(),
                        None => continue,
                    };
                    playlists.push(CollectionSummary {
                        reference: CollectionRef::Playlist(id),
                        name: pl["name"].as_str().unwrap_or("").to_string(),
                        track_count: pl["tracks"]["total"].as_u64().unwrap_or(0),
                    });
                }
            }
            next_url = j["next"].as_str().map(|s| self.absolute(s));
        }
        Ok(playlists)
    }
}
