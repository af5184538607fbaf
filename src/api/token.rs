use crate::db;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Seconds before expiry at which a token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: i64, // epoch seconds
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl StoredToken {
    pub fn needs_refresh(&self, now: i64) -> bool {
        now + REFRESH_MARGIN_SECS >= self.expires_at
    }
}

/// OAuth token cache for one provider, backed by the credentials table.
///
/// The token is loaded lazily from the DB, refreshed through the provider's
/// token endpoint when near expiry, and written back after every refresh.
pub struct TokenStore {
    provider: &'static str,
    client: Client,
    client_id: String,
    client_secret: String,
    db_path: PathBuf,
    token_url: String,
    token: tokio::sync::Mutex<Option<StoredToken>>,
}

impl TokenStore {
    /// Empty `client_id`/`client_secret` are filled from the credentials row
    /// saved by the auth command, if any.
    pub fn new(
        provider: &'static str,
        client_id: String,
        client_secret: String,
        db_path: PathBuf,
        token_url: String,
    ) -> Self {
        let (client_id, client_secret) = if client_id.is_empty() || client_secret.is_empty() {
            match rusqlite::Connection::open(&db_path)
                .map_err(anyhow::Error::from)
                .and_then(|conn| db::load_credential_with_client(&conn, provider))
            {
                Ok(Some((_json, db_id, db_secret))) => {
                    (db_id.unwrap_or(client_id), db_secret.unwrap_or(client_secret))
                }
                _ => (client_id, client_secret),
            }
        } else {
            (client_id, client_secret)
        };
        Self {
            provider,
            client: Client::new(),
            client_id,
            client_secret,
            db_path,
            token_url,
            token: tokio::sync::Mutex::new(None),
        }
    }

    pub fn has_client_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn set_token_url(&mut self, url: String) {
        self.token_url = url;
    }

    async fn load_from_db(&self) -> Result<Option<StoredToken>> {
        let db_path = self.db_path.clone();
        let provider = self.provider;
        let json_opt = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let conn = db::open_or_create(&db_path)?;
            Ok(db::load_credential_with_client(&conn, provider)?.map(|(json, _, _)| json))
        })
        .await??;

        match json_opt {
            Some(s) => {
                let st: StoredToken = serde_json::from_str(&s)
                    .map_err(|e| anyhow!("parse {} token json: {}", self.provider, e))?;
                Ok(Some(st))
            }
            None => Ok(None),
        }
    }

    async fn persist(&self, st: &StoredToken) -> Result<()> {
        let db_path = self.db_path.clone();
        let provider = self.provider;
        let s = serde_json::to_string(st)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = db::open_or_create(&db_path)?;
            db::save_credential_raw(&conn, provider, &s, None, None)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn refresh(&self, cur: &mut StoredToken) -> Result<()> {
        let refresh_token = cur
            .refresh_token
            .clone()
            .ok_or_else(|| anyhow!("no refresh token"))?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let resp = self
            .client
            .post(&self.token_url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("failed to refresh {} token: {} - {}", self.provider, status, body));
        }
        let j: serde_json::Value = resp.json().await?;
        cur.access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("no access_token"))?
            .to_string();
        cur.token_type = "Bearer".into();
        cur.expires_at = Utc::now().timestamp() + j["expires_in"].as_i64().unwrap_or(3600);
        if let Some(s) = j["scope"].as_str() {
            cur.scope = Some(s.to_string());
        }
        // Some servers rotate refresh tokens.
        if let Some(rt) = j["refresh_token"].as_str() {
            cur.refresh_token = Some(rt.to_string());
        }
        self.persist(cur).await
    }

    /// Load the token if needed and refresh it when it is about to expire.
    pub async fn ensure(&self) -> Result<StoredToken> {
        let mut lock = self.token.lock().await;
        if lock.is_none() {
            *lock = self.load_from_db().await?;
        }
        let st = lock.as_mut().ok_or_else(|| {
            anyhow!("no {} token stored; run the auth command first", self.provider)
        })?;
        if st.needs_refresh(Utc::now().timestamp()) {
            if st.refresh_token.is_none() {
                warn!("{} token is near expiry and has no refresh token", self.provider);
            } else {
                debug!("{} token is near expiry, refreshing", self.provider);
                let mut next = st.clone();
                self.refresh(&mut next).await?;
                *st = next;
            }
        }
        Ok(st.clone())
    }

    /// Refresh unconditionally, e.g. after the API answered 401.
    pub async fn force_refresh(&self) -> Result<()> {
        let mut lock = self.token.lock().await;
        if lock.is_none() {
            *lock = self.load_from_db().await?;
        }
        let st = lock.as_mut().ok_or_else(|| {
            anyhow!("no {} token stored; run the auth command first", self.provider)
        })?;
        let mut next = st.clone();
        self.refresh(&mut next).await?;
        *st = next;
        Ok(())
    }

    pub async fn bearer(&self) -> Result<String> {
        let st = self.ensure().await?;
        Ok(format!("Bearer {}", st.access_token))
    }
}

/// Persist a freshly obtained token together with the client credentials
/// used to get it, so later refreshes can authenticate.
pub async fn store_credentials(
    db_path: PathBuf,
    provider: &'static str,
    token: &StoredToken,
    client_id: String,
    client_secret: String,
) -> Result<()> {
    let token_json = serde_json::to_string(token)?;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let conn = db::open_or_create(&db_path)?;
        db::save_credential_raw(
            &conn,
            provider,
            &token_json,
            Some(&client_id),
            Some(&client_secret),
        )?;
        Ok(())
    })
    .await??;
    Ok(())
}
