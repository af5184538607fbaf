use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "spotify-tidal-migrator";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // path to the credentials database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Pause between two migrated tracks, in milliseconds.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Description set on every playlist created on the destination.
    #[serde(default = "default_playlist_description")]
    pub playlist_description: String,

    // Source paging
    #[serde(default = "default_playlist_page_size")]
    pub playlist_page_size: u32,
    #[serde(default = "default_liked_page_size")]
    pub liked_page_size: u32,

    #[serde(default = "default_tidal_country_code")]
    pub tidal_country_code: String,
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

fn default_db_path() -> PathBuf { app_dir(dirs::data_dir()).join("migrator.db") }
fn default_log_dir() -> PathBuf { app_dir(dirs::cache_dir()).join("logs") }
fn default_item_delay_ms() -> u64 { 500 }
fn default_playlist_description() -> String { "Migrated from Spotify".into() }
fn default_playlist_page_size() -> u32 { 100 }
fn default_liked_page_size() -> u32 { 50 }
fn default_tidal_country_code() -> String { "US".into() }

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            item_delay_ms: default_item_delay_ms(),
            playlist_description: default_playlist_description(),
            playlist_page_size: default_playlist_page_size(),
            liked_page_size: default_liked_page_size(),
            tidal_country_code: default_tidal_country_code(),
        }
    }
}

impl Config {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Location of the per-user config file, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Load from an explicit path, else from the per-user config file when it
    /// exists, else fall back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(p) = explicit {
            return Self::from_path(p);
        }
        match Self::default_path() {
            Some(p) if p.exists() => Self::from_path(&p),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=100).contains(&self.playlist_page_size) {
            anyhow::bail!(
                "playlist_page_size must be within 1..=100, got {}",
                self.playlist_page_size
            );
        }
        if !(1..=50).contains(&self.liked_page_size) {
            anyhow::bail!("liked_page_size must be within 1..=50, got {}", self.liked_page_size);
        }
        if self.tidal_country_code.trim().len() != 2 {
            anyhow::bail!(
                "tidal_country_code must be a two-letter code, got {:?}",
                self.tidal_country_code
            );
        }
        Ok(())
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}
