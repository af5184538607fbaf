pub mod mock;
pub mod spotify;
pub mod spotify_auth;
pub mod tidal;
pub mod tidal_auth;
pub mod token;

use crate::models::{CollectionRef, CollectionSummary, SourcePage};
use anyhow::Result;

/// Read side of a migration: the service the tracks come from.
/// Implementations: spotify::SpotifyProvider, mock::MockProvider.
#[async_trait::async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Fetch one page of `collection`. `cursor` is `None` for the first page
    /// and otherwise the `next` token of the previous page.
    async fn fetch_page(
        &self,
        collection: &CollectionRef,
        cursor: Option<&str>,
    ) -> Result<SourcePage>;

    /// Total number of saved tracks as reported by a one-item probe.
    async fn liked_total(&self) -> Result<u64>;

    /// All playlists of the current user.
    async fn list_playlists(&self) -> Result<Vec<CollectionSummary>>;

    /// Return the provider's name (for logging, UI, etc)
    fn name(&self) -> &str;
}

/// Write side of a migration: the service the playlist is created on.
/// Implementations: tidal::TidalProvider, mock::MockProvider.
#[async_trait::async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Search tracks only (no videos, albums or artists). Returns native track
    /// ids in the service's ranking order, at most `limit` of them.
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Create a new, empty playlist and return its remote id.
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    /// Append tracks (native ids) to a playlist.
    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    fn name(&self) -> &str;
}
