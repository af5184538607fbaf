use crate::migrator::{ItemProgress, ItemResult};
use crate::models::{FailedTrack, FailureReason, MigrationOutcome};
use std::fmt::Write as _;

const RULE_WIDTH: usize = 60;

/// Shorten to `max` chars, ending in "..." when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    format!("{}...", s.chars().take(keep).collect::<String>())
}

/// "Artist - Title", with " (API error)" for failures that were not a miss.
pub fn failed_line(f: &FailedTrack) -> String {
    match f.reason {
        FailureReason::NotFound => format!("{} - {}", f.artist, f.title),
        FailureReason::ApiError(_) => format!("{} - {} (API error)", f.artist, f.title),
    }
}

/// One line per migrated track, e.g. `[3/10] ✅ Bohemian Rhapsody`.
pub fn progress_line(p: &ItemProgress<'_>) -> String {
    let prefix = format!("[{}/{}]", p.index, p.total);
    match p.result {
        ItemResult::Added { .. } => format!("{} ✅ {}", prefix, truncate(&p.track.title, 33)),
        ItemResult::NotFound => format!(
            "{} ❌ NOT FOUND: {} - {}",
            prefix, p.track.title, p.track.artist
        ),
        ItemResult::SearchFailed(e) | ItemResult::AddFailed { error: e, .. } => {
            format!("{} ⚠️ Error processing {}: {}", prefix, p.track.title, e)
        }
    }
}

/// Final summary printed after a run.
pub fn render_summary(outcome: &MigrationOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "🏁 Migration finished.");
    let _ = writeln!(out, "Total processed: {}", outcome.attempted());
    let _ = writeln!(out, "Succeeded: {}", outcome.succeeded());
    let _ = writeln!(out, "Failed: {}", outcome.failed().len());
    if !outcome.failed().is_empty() {
        let _ = writeln!(out, "\n📝 Tracks that could not be migrated:");
        for f in outcome.failed() {
            let _ = writeln!(out, " - {}", failed_line(f));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackDescriptor;

    fn track(artist: &str, title: &str) -> TrackDescriptor {
        TrackDescriptor {
            artist: artist.into(),
            title: title.into(),
            source_id: "spotify:track:x".into(),
        }
    }

    #[test]
    fn truncate_only_long_names() {
        assert_eq!(truncate("short", 40), "short");
        let long = "a".repeat(45);
        let t = truncate(&long, 40);
        assert_eq!(t.chars().count(), 40);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn summary_lists_failures_with_reasons() {
        let mut o = MigrationOutcome::new("pl-1");
        o.record_success();
        o.record_failure(&track("Unknown Artist", "Untitled Noise"), FailureReason::NotFound);
        o.record_failure(&track("Queen", "Innuendo"), FailureReason::ApiError("500".into()));
        let s = render_summary(&o);
        assert!(s.contains("Total processed: 3"));
        assert!(s.contains("Succeeded: 1"));
        assert!(s.contains("Failed: 2"));
        assert!(s.contains(" - Unknown Artist - Untitled Noise\n"));
        assert!(s.contains(" - Queen - Innuendo (API error)"));
    }

    #[test]
    fn summary_without_failures_has_no_list() {
        let mut o = MigrationOutcome::new("pl-1");
        o.record_success();
        assert!(!render_summary(&o).contains("could not be migrated"));
    }

    #[test]
    fn progress_lines_per_result() {
        let t = track("Queen", "Bohemian Rhapsody");
        let added = ItemResult::Added { destination_id: "1".into() };
        let line = progress_line(&ItemProgress { index: 1, total: 2, track: &t, result: &added });
        assert_eq!(line, "[1/2] ✅ Bohemian Rhapsody");
        let missing = ItemResult::NotFound;
        let line = progress_line(&ItemProgress { index: 2, total: 2, track: &t, result: &missing });
        assert_eq!(line, "[2/2] ❌ NOT FOUND: Bohemian Rhapsody - Queen");
    }
}
