use super::{DestinationCatalog, SourceCatalog};
use crate::models::{CollectionRef, CollectionSummary, SourceItem, SourcePage, SourceTrack};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::info;

/// Every call a `MockProvider` receives, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FetchPage { collection: CollectionRef, cursor: Option<String> },
    LikedTotal,
    ListPlaylists,
    Search { query: String, limit: usize },
    CreatePlaylist { name: String, description: String },
    AddTracks { playlist_id: String, track_ids: Vec<String> },
}

#[derive(Debug, Clone)]
enum SearchScript {
    Hit(String),
    Fail,
}

/// In-memory source and destination catalog used by the tests.
///
/// Source collections are served as pre-split pages chained by synthetic
/// continuation tokens. Searches return nothing unless scripted.
#[derive(Default)]
pub struct MockProvider {
    pages: HashMap<CollectionRef, Vec<Vec<SourceItem>>>,
    page_errors: HashSet<(CollectionRef, usize)>,
    liked_total: Option<u64>,
    playlists: Vec<CollectionSummary>,
    searches: HashMap<String, SearchScript>,
    fail_create: bool,
    failing_adds: HashSet<String>,
    calls: Mutex<Vec<MockCall>>,
}

/// A page entry for a track that is still in the catalog.
pub fn item(artists: &[&str], name: &str, uri: &str) -> SourceItem {
    SourceItem {
        track: Some(SourceTrack {
            artists: artists.iter().map(|a| a.to_string()).collect(),
            name: name.to_string(),
            uri: uri.to_string(),
        }),
    }
}

/// A page entry whose track was removed from the catalog.
pub fn removed() -> SourceItem {
    SourceItem { track: None }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, collection: CollectionRef, pages: Vec<Vec<SourceItem>>) -> Self {
        self.pages.insert(collection, pages);
        self
    }

    /// Make fetching page `index` (0-based) of `collection` fail.
    pub fn with_page_error(mut self, collection: CollectionRef, index: usize) -> Self {
        self.page_errors.insert((collection, index));
        self
    }

    pub fn with_liked_total(mut self, total: u64) -> Self {
        self.liked_total = Some(total);
        self
    }

    pub fn with_playlists(mut self, playlists: Vec<CollectionSummary>) -> Self {
        self.playlists = playlists;
        self
    }

    pub fn with_search_hit(mut self, query: &str, track_id: &str) -> Self {
        self.searches
            .insert(query.to_string(), SearchScript::Hit(track_id.to_string()));
        self
    }

    pub fn with_search_error(mut self, query: &str) -> Self {
        self.searches.insert(query.to_string(), SearchScript::Fail);
        self
    }

    pub fn with_create_error(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn with_add_error(mut self, track_id: &str) -> Self {
        self.failing_adds.insert(track_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn page_token(collection: &CollectionRef, index: usize) -> String {
        format!("{}#{}", collection, index)
    }

    fn page_index(collection: &CollectionRef, cursor: Option<&str>) -> Result<usize> {
        match cursor {
            None => Ok(0),
            Some(tok) => tok
                .strip_prefix(&format!("{}#", collection))
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| anyhow!("unknown continuation token {:?}", tok)),
        }
    }
}

#[async_trait]
impl SourceCatalog for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_page(
        &self,
        collection: &CollectionRef,
        cursor: Option<&str>,
    ) -> Result<SourcePage> {
        self.record(MockCall::FetchPage {
            collection: collection.clone(),
            cursor: cursor.map(|c| c.to_string()),
        });
        let index = Self::page_index(collection, cursor)?;
        if self.page_errors.contains(&(collection.clone(), index)) {
            return Err(anyhow!("mock page {} of {} failed", index, collection));
        }
        let pages = self
            .pages
            .get(collection)
            .ok_or_else(|| anyhow!("no such collection: {}", collection))?;
        let items = pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < pages.len()).then(|| Self::page_token(collection, index + 1));
        let total = pages.iter().map(|p| p.len() as u64).sum();
        Ok(SourcePage { items, next, total: Some(total) })
    }

    async fn liked_total(&self) -> Result<u64> {
        self.record(MockCall::LikedTotal);
        match self.liked_total {
            Some(t) => Ok(t),
            None => Ok(self
                .pages
                .get(&CollectionRef::Liked)
                .map(|p| p.iter().map(|page| page.len() as u64).sum())
                .unwrap_or(0)),
        }
    }

    async fn list_playlists(&self) -> Result<Vec<CollectionSummary>> {
        self.record(MockCall::ListPlaylists);
        Ok(self.playlists.clone())
    }
}

#[async_trait]
impl DestinationCatalog for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        info!("MockProvider: search {:?}", query);
        self.record(MockCall::Search { query: query.to_string(), limit });
        match self.searches.get(query) {
            Some(SearchScript::Hit(id)) => Ok(vec![id.clone()].into_iter().take(limit).collect()),
            Some(SearchScript::Fail) => Err(anyhow!("mock search failed for {:?}", query)),
            None => Ok(Vec::new()),
        }
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        info!("MockProvider: create_playlist {}", name);
        self.record(MockCall::CreatePlaylist {
            name: name.to_string(),
            description: description.to_string(),
        });
        if self.fail_create {
            return Err(anyhow!("mock create playlist failed"));
        }
        let created = self
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::CreatePlaylist { .. }))
            .count();
        Ok(format!("mock-playlist-{}", created))
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        info!("MockProvider: add_tracks {} -> {} tracks", playlist_id, track_ids.len());
        self.record(MockCall::AddTracks {
            playlist_id: playlist_id.to_string(),
            track_ids: track_ids.to_vec(),
        });
        if track_ids.iter().any(|id| self.failing_adds.contains(id)) {
            return Err(anyhow!("mock add failed"));
        }
        Ok(())
    }
}
