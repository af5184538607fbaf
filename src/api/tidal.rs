use super::token::TokenStore;
use super::DestinationCatalog;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;

const TIDAL_JSON: &str = "application/vnd.tidal.v1+json";

/// Tidal provider: the destination side of a migration. It searches the
/// catalog for tracks, creates playlists and appends tracks to them.
///
/// Base URLs come from `TIDAL_API_BASE` / `TIDAL_AUTH_BASE` when set, or from
/// `with_api_base` / `with_auth_base` (mockito tests).
pub struct TidalProvider {
    client: Client,
    tokens: TokenStore,
    api_base: String,
    country_code: String,
}

impl TidalProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        db_path: PathBuf,
        country_code: String,
    ) -> Self {
        let token_url = format!("{}/v1/oauth2/token", Self::default_auth_base());
        Self {
            client: Client::new(),
            tokens: TokenStore::new("tidal", client_id, client_secret, db_path, token_url),
            api_base: Self::default_api_base(),
            country_code,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.tokens
            .set_token_url(format!("{}/v1/oauth2/token", base.trim_end_matches('/')));
        self
    }

    pub fn default_api_base() -> String {
        // Default to the official TIDAL developer base URL.
        std::env::var("TIDAL_API_BASE").unwrap_or_else(|_| "https://openapi.tidal.com/v2".into())
    }

    pub fn default_auth_base() -> String {
        std::env::var("TIDAL_AUTH_BASE").unwrap_or_else(|_| "https://auth.tidal.com".into())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.has_client_credentials()
    }

    /// Make sure a usable token is stored (refreshing it if needed).
    pub async fn check_login(&self) -> Result<()> {
        self.tokens.ensure().await.map(|_| ())
    }

    /// Send a request built by `build`, refreshing the token once on 401.
    /// When `retry_rate_limited` is set, 429 answers are retried up to three
    /// times after the advertised `retry-after`.
    async fn send<F>(&self, build: F, retry_rate_limited: bool) -> Result<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let bearer = self.tokens.bearer().await?;
            let resp = build(&bearer).send().await?;
            let status = resp.status();

            if status == StatusCode::UNAUTHORIZED && attempt == 1 {
                warn!("Got 401 from Tidal; attempting token refresh");
                self.tokens.force_refresh().await?;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS && retry_rate_limited && attempt <= 3 {
                let retry_after = retry_after_secs(&resp).unwrap_or(2);
                debug!("Tidal rate limited; sleeping {}s", retry_after + 1);
                tokio::time::sleep(std::time::Duration::from_secs(retry_after + 1)).await;
                continue;
            }
            return Ok(resp);
        }
    }
}

fn retry_after_secs(resp: &Response) -> Option<u64> {
    resp.headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

fn id_of(item: &Value) -> Option<String> {
    item["id"]
        .as_str()
        .map(|s| s.trim().to_string())
        .or_else(|| item["id"].as_i64().map(|n| n.to_string()))
        .filter(|s| !s.is_empty())
}

/// Pull track ids out of a search response, best ranked first.
///
/// TIDAL search responses may return an `items` array directly, wrap it in
/// an `items` object with its own `items` array, or use a JSON:API `data`
/// array; handle all three. JSON:API resources of another type are skipped.
pub(crate) fn parse_search_ids(j: &Value, limit: usize) -> Vec<String> {
    let items = j["items"]
        .as_array()
        .or_else(|| j["items"]["items"].as_array())
        .or_else(|| j["data"].as_array());
    let Some(items) = items else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|it| it["type"].as_str().map_or(true, |t| t == "tracks"))
        .filter_map(id_of)
        .take(limit)
        .collect()
}

#[async_trait]
impl DestinationCatalog for TidalProvider {
    fn name(&self) -> &str {
        "tidal"
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/search/tracks?query={}&limit={}&countryCode={}",
            self.api_base,
            urlencoding::encode(query),
            limit,
            self.country_code
        );
        let resp = self
            .send(|bearer| self.client.get(&url).header(AUTHORIZATION, bearer), true)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("tidal search failed: {} => {}", status, txt));
        }
        let j: Value = resp.json().await?;
        Ok(parse_search_ids(&j, limit))
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        // JSON:API-style endpoint: POST /playlists
        let url = format!("{}/playlists?countryCode={}", self.api_base, self.country_code);
        let body = json!({
            "data": {
                "type": "playlists",
                "attributes": {
                    "name": name,
                    "description": description,
                    "public": false
                }
            }
        });
        let resp = self
            .send(
                |bearer| {
                    self.client
                        .post(&url)
                        .header(AUTHORIZATION, bearer)
                        .header(CONTENT_TYPE, TIDAL_JSON)
                        .json(&body)
                },
                true,
            )
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("tidal create playlist failed: {} => {}", status, txt));
        }
        let j: Value = resp.json().await?;
        // Tidal JSON:API responses return id under data.id
        j.get("data")
            .and_then(|d| d.get("id"))
            .and_then(|v| v.as_str())
            // Fallbacks for older/undocumented shapes
            .or_else(|| j.get("uuid").and_then(|v| v.as_str()))
            .or_else(|| j.get("id").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("no playlist id in response"))
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        // JSON:API relationship endpoint: POST /playlists/{id}/relationships/items
        let url = format!(
            "{}/playlists/{}/relationships/items?countryCode={}",
            self.api_base,
            urlencoding::encode(playlist_id),
            self.country_code
        );
        // Accept both bare ids and "tidal:track:{id}" forms.
        let data: Vec<Value> = track_ids
            .iter()
            .filter_map(|u| {
                let id = u.rsplit(':').next().unwrap_or("").trim();
                if id.is_empty() {
                    None
                } else {
                    Some(json!({ "type": "tracks", "id": id, "meta": {} }))
                }
            })
            .collect();
        if data.is_empty() {
            if track_ids.is_empty() {
                return Ok(());
            }
            return Err(anyhow!("no usable tidal track id in {:?}", track_ids));
        }
        let body = json!({ "data": data });
        let resp = self
            .send(
                |bearer| {
                    self.client
                        .post(&url)
                        .header(AUTHORIZATION, bearer)
                        .header(CONTENT_TYPE, TIDAL_JSON)
                        .json(&body)
                },
                false,
            )
            .await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!("rate_limited: retry_after={:?}", retry_after_secs(&resp)));
        }
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("tidal add tracks failed: {} => {}", status, txt));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ids_accept_all_response_shapes() {
        let flat = json!({ "items": [{ "id": 123 }, { "id": "456" }] });
        assert_eq!(parse_search_ids(&flat, 1), vec!["123".to_string()]);

        let nested = json!({ "items": { "items": [{ "id": "77" }] } });
        assert_eq!(parse_search_ids(&nested, 5), vec!["77".to_string()]);

        let jsonapi = json!({ "data": [
            { "type": "videos", "id": "v1" },
            { "type": "tracks", "id": "t1" }
        ]});
        assert_eq!(parse_search_ids(&jsonapi, 1), vec!["t1".to_string()]);

        assert!(parse_search_ids(&json!({ "items": [] }), 1).is_empty());
        assert!(parse_search_ids(&json!({}), 1).is_empty());
    }

    #[test]
    fn blank_ids_are_not_matches() {
        let j = json!({ "items": [{ "id": "" }, { "id": "  " }] });
        assert!(parse_search_ids(&j, 1).is_empty());
    }
}
