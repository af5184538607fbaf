//! Manual OAuth code flow:
//! 1. print the authorization URL,
//! 2. the user approves it in a browser and pastes back the redirect URL,
//! 3. the `code` in it is exchanged for tokens,
//! 4. tokens and client credentials are stored in the credentials table.
//!
//! No local HTTP server is needed; the redirect target may well fail to load.

use super::spotify::SpotifyProvider;
use super::token::{store_credentials, StoredToken};
use crate::config::Config;
use crate::select::InputProvider;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

/// Read-only access: playlists, saved tracks and the profile name.
pub const SCOPES: &[&str] = &["playlist-read-private", "user-library-read", "user-read-private"];
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

pub fn authorize_url(auth_base: &str, client_id: &str, redirect_uri: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/authorize", auth_base.trim_end_matches('/')))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("show_dialog", "true");
    Ok(url)
}

/// Pull the `code` query parameter out of a pasted redirect URL.
pub fn code_from_redirect(pasted: &str) -> Result<String> {
    let parsed = Url::parse(pasted.trim()).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    if let Some((_, err)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        return Err(anyhow!("authorization was denied: {}", err));
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| anyhow!("no code in redirect URL"))
}

pub async fn exchange_code(
    client: &Client,
    auth_base: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<StoredToken> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    let auth_header = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{}:{}", client_id, client_secret))
    );
    let resp = client
        .post(format!("{}/api/token", auth_base.trim_end_matches('/')))
        .header("Authorization", auth_header)
        .form(&params)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed: {} => {}", status, txt));
    }

    let tr: TokenResponse = resp.json().await?;
    Ok(StoredToken {
        access_token: tr.access_token,
        token_type: tr.token_type,
        expires_at: chrono::Utc::now().timestamp() + tr.expires_in,
        refresh_token: tr.refresh_token,
        scope: tr.scope,
    })
}

fn required(input: &mut dyn InputProvider, prompt: &str, what: &str) -> Result<String> {
    let v = input.read_line(prompt)?.trim().to_string();
    if v.is_empty() {
        return Err(anyhow!("no {} provided", what));
    }
    Ok(v)
}

pub async fn run_spotify_auth(cfg: &Config, input: &mut dyn InputProvider) -> Result<()> {
    let client_id = required(input, "Enter your Spotify client_id: ", "client_id")?;
    let client_secret = required(input, "Enter your Spotify client_secret: ", "client_secret")?;
    let redirect_uri = {
        let v = input.read_line(&format!(
            "Enter your Spotify redirect URI (leave blank for {}): ",
            DEFAULT_REDIRECT_URI
        ))?;
        let v = v.trim();
        if v.is_empty() {
            DEFAULT_REDIRECT_URI.to_string()
        } else {
            v.to_string()
        }
    };

    let auth_base = SpotifyProvider::default_auth_base();
    let url = authorize_url(&auth_base, &client_id, &redirect_uri)?;
    input.say(&format!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    ));
    input.say("After authorizing you will be redirected; copy the full redirect URL.");
    let pasted = input.read_line("Paste redirect URL: ")?;
    let code = code_from_redirect(&pasted)?;

    let token = exchange_code(
        &Client::new(),
        &auth_base,
        &client_id,
        &client_secret,
        &code,
        &redirect_uri,
    )
    .await?;
    store_credentials(cfg.db_path.clone(), "spotify", &token, client_id, client_secret).await?;

    info!("Spotify tokens saved to {}", cfg.db_path.display());
    input.say("Saved Spotify tokens. You can now run `migrate`.");
    Ok(())
}
