use std::fmt;
use std::str::FromStr;

/// CLI spelling of the saved-tracks pseudo-collection.
pub const LIKED_SONGS_SENTINEL: &str = "liked";

/// One track as read from the source collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub artist: String,
    pub title: String,
    /// Native reference on the source service (e.g. "spotify:track:...").
    pub source_id: String,
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Which source collection to read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionRef {
    Playlist(String),
    /// The user's liked/saved tracks.
    Liked,
}

impl CollectionRef {
    pub fn is_liked(&self) -> bool {
        matches!(self, CollectionRef::Liked)
    }
}

impl FromStr for CollectionRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("empty collection reference"));
        }
        if s.eq_ignore_ascii_case(LIKED_SONGS_SENTINEL) {
            return Ok(CollectionRef::Liked);
        }
        Ok(CollectionRef::Playlist(s.to_string()))
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionRef::Playlist(id) => write!(f, "{}", id),
            CollectionRef::Liked => write!(f, "{}", LIKED_SONGS_SENTINEL),
        }
    }
}

/// A row in the selection menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub reference: CollectionRef,
    pub name: String,
    pub track_count: u64,
}

/// Track as it appears inside a raw source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTrack {
    /// Credited artists in listing order.
    pub artists: Vec<String>,
    pub name: String,
    pub uri: String,
}

/// Entry of a source page. `track` is `None` when the underlying track was
/// removed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub track: Option<SourceTrack>,
}

/// One page of a paged source listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePage {
    pub items: Vec<SourceItem>,
    /// Opaque continuation token; `None` once the listing is exhausted.
    pub next: Option<String>,
    pub total: Option<u64>,
}

/// Result of resolving one track against the destination catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { destination_id: String },
    NotFound,
    /// The search call itself failed.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NotFound,
    ApiError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => write!(f, "not found"),
            FailureReason::ApiError(_) => write!(f, "API error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTrack {
    pub artist: String,
    pub title: String,
    pub reason: FailureReason,
}

/// Aggregate result of one migration run.
///
/// Counters only move forward through `record_success` / `record_failure`,
/// which keeps `attempted == succeeded + failed.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub playlist_id: String,
    attempted: usize,
    succeeded: usize,
    failed: Vec<FailedTrack>,
}

impl MigrationOutcome {
    pub fn new(playlist_id: impl Into<String>) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, track: &TrackDescriptor, reason: FailureReason) {
        self.attempted += 1;
        self.failed.push(FailedTrack {
            artist: track.artist.clone(),
            title: track.title.clone(),
            reason,
        });
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> &[FailedTrack] {
        &self.failed
    }
}
