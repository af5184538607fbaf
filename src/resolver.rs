//! Artist + title lookup of a source track on the destination catalog.

use crate::api::DestinationCatalog;
use crate::models::{Resolution, TrackDescriptor};
use tracing::debug;

/// Search string for a track: artist and title joined by one space, as is.
pub fn build_query(track: &TrackDescriptor) -> String {
    format!("{} {}", track.artist, track.title)
}

/// Resolves tracks against one destination catalog.
///
/// The top search hit is taken as the match without comparing its metadata
/// to the query, so a plausible but wrong track can be accepted.
pub struct TrackResolver<'a> {
    destination: &'a dyn DestinationCatalog,
}

impl<'a> TrackResolver<'a> {
    pub fn new(destination: &'a dyn DestinationCatalog) -> Self {
        Self { destination }
    }

    pub async fn resolve(&self, track: &TrackDescriptor) -> Resolution {
        let query = build_query(track);
        match self.destination.search_tracks(&query, 1).await {
            Ok(ids) => match ids.into_iter().next() {
                Some(destination_id) => {
                    debug!(
                        "Resolved {:?} to {} track {}",
                        query,
                        self.destination.name(),
                        destination_id
                    );
                    Resolution::Found { destination_id }
                }
                None => Resolution::NotFound,
            },
            Err(e) => Resolution::Error(format!("{:#}", e)),
        }
    }
}
