//! Extraction of a source collection as an ordered list of tracks.

use crate::api::SourceCatalog;
use crate::models::{CollectionRef, SourceItem, TrackDescriptor};
use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

/// Map a raw page entry to a descriptor. Entries whose track was removed
/// from the catalog yield `None`. Only the first credited artist is kept.
pub fn to_descriptor(item: SourceItem) -> Option<TrackDescriptor> {
    let track = item.track?;
    Some(TrackDescriptor {
        artist: track.artists.into_iter().next().unwrap_or_default(),
        title: track.name,
        source_id: track.uri,
    })
}

/// Lazily walks every page of one source collection.
///
/// Pages are requested one at a time, only when the buffered tracks of the
/// previous page are used up. Iteration ends when the source stops handing
/// out a continuation token; a token handed out twice is an error, so a
/// cycling source cannot loop forever. A reader is single-use: create a new one to
/// start again from the first page.
pub struct CatalogReader<'a> {
    source: &'a dyn SourceCatalog,
    collection: CollectionRef,
    buffer: VecDeque<TrackDescriptor>,
    cursor: Option<String>,
    seen_cursors: HashSet<String>,
    started: bool,
    exhausted: bool,
    pages_fetched: u32,
    reported_total: Option<u64>,
}

impl<'a> CatalogReader<'a> {
    pub fn new(source: &'a dyn SourceCatalog, collection: CollectionRef) -> Self {
        Self {
            source,
            collection,
            buffer: VecDeque::new(),
            cursor: None,
            seen_cursors: HashSet::new(),
            started: false,
            exhausted: false,
            pages_fetched: 0,
            reported_total: None,
        }
    }

    /// Next track in source order, `Ok(None)` once all pages are consumed.
    pub async fn next(&mut self) -> Result<Option<TrackDescriptor>> {
        loop {
            if let Some(track) = self.buffer.pop_front() {
                return Ok(Some(track));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    /// Drain the reader. Any page failure fails the whole extraction.
    pub async fn collect_all(mut self) -> Result<Vec<TrackDescriptor>> {
        let mut tracks = Vec::new();
        while let Some(track) = self.next().await? {
            tracks.push(track);
        }
        info!(
            "Read {} tracks from {} collection {} in {} page(s)",
            tracks.len(),
            self.source.name(),
            self.collection,
            self.pages_fetched
        );
        Ok(tracks)
    }

    /// Size reported by the liked-songs probe, if this reader ran one.
    pub fn reported_total(&self) -> Option<u64> {
        self.reported_total
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            if self.collection.is_liked() {
                // The probe only informs; paging below runs until the
                // continuation token runs out, whatever this total says.
                let total = self.source.liked_total().await?;
                info!("Liked songs report {} tracks; downloading", total);
                self.reported_total = Some(total);
            }
        }

        let page = self
            .source
            .fetch_page(&self.collection, self.cursor.as_deref())
            .await?;
        self.pages_fetched += 1;

        let before = self.buffer.len();
        let raw = page.items.len();
        self.buffer.extend(page.items.into_iter().filter_map(to_descriptor));
        debug!(
            "Page {} of {}: {} items, {} skipped as removed",
            self.pages_fetched,
            self.collection,
            raw,
            raw - (self.buffer.len() - before)
        );

        match page.next {
            Some(next) if !self.seen_cursors.insert(next.clone()) => {
                return Err(anyhow!(
                    "{} returned continuation token {:?} twice for {}",
                    self.source.name(),
                    next,
                    self.collection
                ));
            }
            Some(next) => self.cursor = Some(next),
            None => self.exhausted = true,
        }
        Ok(())
    }
}

/// Read a whole collection into memory.
pub async fn read_collection(
    source: &dyn SourceCatalog,
    collection: CollectionRef,
) -> Result<Vec<TrackDescriptor>> {
    CatalogReader::new(source, collection).collect_all().await
}
