use anyhow::Result;
use async_trait::async_trait;
use spotify_tidal_migrator::api::mock::{item, removed, MockCall, MockProvider};
use spotify_tidal_migrator::api::SourceCatalog;
use spotify_tidal_migrator::models::{CollectionRef, CollectionSummary, SourcePage};
use spotify_tidal_migrator::reader::{read_collection, CatalogReader};
use std::sync::atomic::{AtomicUsize, Ordering};

fn playlist(id: &str) -> CollectionRef {
    CollectionRef::Playlist(id.into())
}

#[tokio::test]
async fn pages_are_concatenated_in_source_order() {
    let pl = playlist("road-trip");
    let mock = MockProvider::new().with_pages(
        pl.clone(),
        vec![
            vec![
                item(&["Queen"], "Bohemian Rhapsody", "spotify:track:1"),
                item(&["Daft Punk"], "One More Time", "spotify:track:2"),
            ],
            vec![item(&["Björk"], "Jóga", "spotify:track:3")],
        ],
    );

    let tracks = read_collection(&mock, pl.clone()).await.unwrap();
    let titles: Vec<_> = tracks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Bohemian Rhapsody", "One More Time", "Jóga"]);
    assert_eq!(tracks[2].artist, "Björk");
    assert_eq!(tracks[0].source_id, "spotify:track:1");

    // second page fetched with the token handed out by the first
    let fetches: Vec<_> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::FetchPage { cursor, .. } => Some(cursor),
            _ => None,
        })
        .collect();
    assert_eq!(fetches, vec![None, Some("road-trip#1".to_string())]);
}

#[tokio::test]
async fn removed_tracks_are_skipped_and_first_artist_kept() {
    let pl = playlist("mixed");
    let mock = MockProvider::new().with_pages(
        pl.clone(),
        vec![vec![
            item(&["Queen", "David Bowie"], "Under Pressure", "spotify:track:1"),
            removed(),
            item(&[], "Untitled", "spotify:track:2"),
        ]],
    );

    let tracks = read_collection(&mock, pl).await.unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].artist, "Queen");
    assert_eq!(tracks[1].artist, "");
    assert_eq!(tracks[1].to_string(), " - Untitled");
}

#[tokio::test]
async fn empty_collection_yields_no_tracks() {
    let pl = playlist("empty");
    let mock = MockProvider::new().with_pages(pl.clone(), vec![vec![]]);
    assert!(read_collection(&mock, pl).await.unwrap().is_empty());
}

#[tokio::test]
async fn liked_total_is_read_before_paging() {
    let mock = MockProvider::new().with_liked_total(3).with_pages(
        CollectionRef::Liked,
        vec![
            vec![
                item(&["Queen"], "Bohemian Rhapsody", "spotify:track:1"),
                item(&["ABBA"], "Dancing Queen", "spotify:track:4"),
            ],
            vec![item(&["Daft Punk"], "One More Time", "spotify:track:2")],
        ],
    );

    let mut reader = CatalogReader::new(&mock, CollectionRef::Liked);
    let mut titles = Vec::new();
    while let Some(t) = reader.next().await.unwrap() {
        titles.push(t.title);
    }
    assert_eq!(titles, vec!["Bohemian Rhapsody", "Dancing Queen", "One More Time"]);
    assert_eq!(reader.reported_total(), Some(3));
    assert_eq!(reader.pages_fetched(), 2);

    let calls = mock.calls();
    assert_eq!(calls[0], MockCall::LikedTotal);
    assert!(matches!(calls[1], MockCall::FetchPage { ref cursor, .. } if cursor.is_none()));
    assert_eq!(calls.iter().filter(|c| **c == MockCall::LikedTotal).count(), 1);
}

#[tokio::test]
async fn liked_songs_map_like_playlist_items() {
    let page = vec![
        item(&["Queen", "David Bowie"], "Under Pressure", "spotify:track:1"),
        removed(),
    ];
    let mock = MockProvider::new()
        .with_pages(CollectionRef::Liked, vec![page.clone()])
        .with_pages(playlist("same"), vec![page]);

    let liked = read_collection(&mock, CollectionRef::Liked).await.unwrap();
    let pl = read_collection(&mock, playlist("same")).await.unwrap();
    assert_eq!(liked, pl);
}

#[tokio::test]
async fn liked_total_does_not_limit_paging() {
    // the reported total is low; every page is still read
    let mock = MockProvider::new().with_liked_total(1).with_pages(
        CollectionRef::Liked,
        vec![
            vec![item(&["A"], "one", "spotify:track:a")],
            vec![item(&["B"], "two", "spotify:track:b")],
        ],
    );
    let tracks = read_collection(&mock, CollectionRef::Liked).await.unwrap();
    assert_eq!(tracks.len(), 2);
}

#[tokio::test]
async fn failing_page_fails_the_whole_read() {
    let pl = playlist("broken");
    let mock = MockProvider::new()
        .with_pages(
            pl.clone(),
            vec![
                vec![item(&["Queen"], "Bohemian Rhapsody", "spotify:track:1")],
                vec![item(&["Queen"], "Innuendo", "spotify:track:2")],
            ],
        )
        .with_page_error(pl.clone(), 1);

    let err = read_collection(&mock, pl).await.unwrap_err();
    assert!(format!("{:#}", err).contains("page 1"));
}

#[tokio::test]
async fn reader_only_fetches_when_buffer_runs_dry() {
    let pl = playlist("lazy");
    let mock = MockProvider::new().with_pages(
        pl.clone(),
        vec![
            vec![
                item(&["A"], "one", "spotify:track:a"),
                item(&["B"], "two", "spotify:track:b"),
            ],
            vec![item(&["C"], "three", "spotify:track:c")],
        ],
    );

    let mut reader = CatalogReader::new(&mock, pl);
    reader.next().await.unwrap();
    reader.next().await.unwrap();
    assert_eq!(reader.pages_fetched(), 1);
    reader.next().await.unwrap();
    assert_eq!(reader.pages_fetched(), 2);
    assert!(reader.next().await.unwrap().is_none());
    assert_eq!(reader.pages_fetched(), 2);
}

/// Hands out continuation tokens A, B, A, B, ... forever.
struct CyclingSource {
    fetches: AtomicUsize,
}

#[async_trait]
impl SourceCatalog for CyclingSource {
    async fn fetch_page(
        &self,
        _collection: &CollectionRef,
        _cursor: Option<&str>,
    ) -> Result<SourcePage> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = if n % 2 == 0 { "A" } else { "B" };
        Ok(SourcePage {
            items: vec![item(&["Loop"], &format!("track {}", n), "spotify:track:loop")],
            next: Some(next.to_string()),
            total: None,
        })
    }

    async fn liked_total(&self) -> Result<u64> {
        Ok(0)
    }

    async fn list_playlists(&self) -> Result<Vec<CollectionSummary>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "cycling"
    }
}

#[tokio::test]
async fn cycling_continuation_tokens_fail_the_read() {
    let source = CyclingSource { fetches: AtomicUsize::new(0) };
    let err = read_collection(&source, playlist("loop")).await.unwrap_err();
    assert!(err.to_string().contains("twice"));
    // A, B, then A again
    assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
}
