//! End-to-end migration of one ordered track list into a new playlist.

use crate::api::DestinationCatalog;
use crate::models::{FailureReason, MigrationOutcome, Resolution, TrackDescriptor};
use crate::pacing::{FixedDelay, Pacer};
use crate::resolver::TrackResolver;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Processing,
    Completed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Created => "created",
            RunState::Processing => "processing",
            RunState::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// What happened to a single track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Added { destination_id: String },
    NotFound,
    SearchFailed(String),
    AddFailed { destination_id: String, error: String },
}

impl ItemResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Added { .. })
    }
}

/// Passed to the progress callback after each track.
#[derive(Debug)]
pub struct ItemProgress<'a> {
    /// 1-based position in the track list.
    pub index: usize,
    pub total: usize,
    pub track: &'a TrackDescriptor,
    pub result: &'a ItemResult,
}

pub type ProgressFn = Box<dyn Fn(&ItemProgress<'_>) + Send + Sync>;

/// Drives a migration against one destination catalog.
///
/// Tracks are handled strictly one after another. Any per-track failure
/// (search error, no match, failed add) is recorded in the outcome and the
/// loop moves on; only the initial playlist creation can abort a run.
/// Running twice creates two playlists.
pub struct Migrator {
    destination: Arc<dyn DestinationCatalog>,
    pacer: Arc<dyn Pacer>,
    description: String,
    progress: Option<ProgressFn>,
}

impl Migrator {
    pub fn new(destination: Arc<dyn DestinationCatalog>, description: impl Into<String>) -> Self {
        Self {
            destination,
            pacer: Arc::new(FixedDelay::default()),
            description: description.into(),
            progress: None,
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(
        &self,
        playlist_name: &str,
        tracks: &[TrackDescriptor],
    ) -> Result<MigrationOutcome> {
        let mut state = RunState::Created;
        debug!("Migration run {}", state);

        let playlist_id = self
            .destination
            .create_playlist(playlist_name, &self.description)
            .await
            .with_context(|| {
                format!(
                    "creating playlist {:?} on {}",
                    playlist_name,
                    self.destination.name()
                )
            })?;
        info!(
            "Created {} playlist {:?} with id {}",
            self.destination.name(),
            playlist_name,
            playlist_id
        );

        state = transition(state, RunState::Processing);
        let mut outcome = MigrationOutcome::new(playlist_id.clone());
        let resolver = TrackResolver::new(self.destination.as_ref());
        let total = tracks.len();

        for (i, track) in tracks.iter().enumerate() {
            let result = self.migrate_one(&resolver, &playlist_id, track).await;
            match &result {
                ItemResult::Added { .. } => outcome.record_success(),
                ItemResult::NotFound => outcome.record_failure(track, FailureReason::NotFound),
                ItemResult::SearchFailed(e) | ItemResult::AddFailed { error: e, .. } => {
                    outcome.record_failure(track, FailureReason::ApiError(e.clone()))
                }
            }
            if let Some(progress) = &self.progress {
                progress(&ItemProgress {
                    index: i + 1,
                    total,
                    track,
                    result: &result,
                });
            }
            if i + 1 < total {
                self.pacer.pause().await;
            }
        }

        transition(state, RunState::Completed);
        info!(
            "Migration into {} finished: {} attempted, {} succeeded, {} failed",
            playlist_id,
            outcome.attempted(),
            outcome.succeeded(),
            outcome.failed().len()
        );
        Ok(outcome)
    }

    async fn migrate_one(
        &self,
        resolver: &TrackResolver<'_>,
        playlist_id: &str,
        track: &TrackDescriptor,
    ) -> ItemResult {
        match resolver.resolve(track).await {
            Resolution::Found { destination_id } => {
                match self
                    .destination
                    .add_tracks(playlist_id, std::slice::from_ref(&destination_id))
                    .await
                {
                    Ok(()) => ItemResult::Added { destination_id },
                    Err(e) => {
                        warn!("Adding {} ({}) failed: {:#}", track, destination_id, e);
                        ItemResult::AddFailed {
                            destination_id,
                            error: format!("{:#}", e),
                        }
                    }
                }
            }
            Resolution::NotFound => {
                debug!("No match for {}", track);
                ItemResult::NotFound
            }
            Resolution::Error(e) => {
                warn!("Search for {} failed: {}", track, e);
                ItemResult::SearchFailed(e)
            }
        }
    }
}

fn transition(from: RunState, to: RunState) -> RunState {
    debug!("Migration run {} -> {}", from, to);
    to
}
