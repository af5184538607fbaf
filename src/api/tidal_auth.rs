use super::token::{store_credentials, StoredToken};
use crate::config::Config;
use crate::select::InputProvider;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::info;

/// Token JSON as handed out by the TIDAL device/login flow. Only
/// `access_token` is mandatory.
#[derive(Deserialize)]
struct TokenBlob {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// Turn a pasted token blob into the stored form, converting a relative
/// `expires_in` into an absolute `expires_at`.
pub fn parse_token_blob(s: &str, now: i64) -> Result<StoredToken> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("no input provided"));
    }
    let tb: TokenBlob =
        serde_json::from_str(s).map_err(|e| anyhow!("invalid tidal token json: {}", e))?;
    let expires_at = tb
        .expires_at
        .or_else(|| tb.expires_in.map(|secs| now + secs))
        .unwrap_or(0);
    Ok(StoredToken {
        access_token: tb.access_token,
        token_type: tb.token_type.unwrap_or_else(|| "Bearer".into()),
        expires_at,
        refresh_token: tb.refresh_token,
        scope: tb.scope,
    })
}

pub async fn run_tidal_auth(cfg: &Config, input: &mut dyn InputProvider) -> Result<()> {
    let blob = input.read_line("Paste TIDAL token JSON (single line) and press Enter: ")?;
    let token = parse_token_blob(&blob, chrono::Utc::now().timestamp())?;

    let client_id = input.read_line("Enter your TIDAL client_id: ")?.trim().to_string();
    if client_id.is_empty() {
        return Err(anyhow!("no client_id provided"));
    }
    let client_secret = input.read_line("Enter your TIDAL client_secret: ")?.trim().to_string();
    if client_secret.is_empty() {
        return Err(anyhow!("no client_secret provided"));
    }

    store_credentials(cfg.db_path.clone(), "tidal", &token, client_id, client_secret).await?;
    info!("TIDAL token saved to {}", cfg.db_path.display());
    input.say("Saved TIDAL token.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_in_becomes_absolute() {
        let blob = r#"{"access_token":"a","expires_in":600,"refresh_token":"r"}"#;
        let t = parse_token_blob(blob, 1_000).unwrap();
        assert_eq!(t.expires_at, 1_600);
        assert_eq!(t.token_type, "Bearer");
        assert_eq!(t.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn extra_blob_fields_are_ignored() {
        let blob = r#"{"access_token":"a","expires_at":42,"user_id":1234,"countryCode":"NO"}"#;
        let t = parse_token_blob(blob, 1_000).unwrap();
        assert_eq!(t.expires_at, 42);
        let stored = serde_json::to_value(&t).unwrap();
        assert!(stored.get("user_id").is_none());
    }

    #[test]
    fn blob_without_access_token_is_rejected() {
        assert!(parse_token_blob(r#"{"refresh_token":"r"}"#, 0).is_err());
        assert!(parse_token_blob("   ", 0).is_err());
    }
}
