//! Interactive collection selection, confirmation and naming.
//!
//! All user input goes through [`InputProvider`] so the prompts can be
//! scripted in tests; the CLI plugs in [`StdinInput`].

use crate::api::SourceCatalog;
use crate::models::{CollectionRef, CollectionSummary};
use crate::report::truncate;
use anyhow::{anyhow, bail, Result};
use std::fmt::Write as _;
use std::io::{BufRead, Write};

pub const LIKED_SONGS_LABEL: &str = "❤️  Liked Songs";
const NAME_WIDTH: usize = 40;

pub trait InputProvider {
    /// Show `prompt` and return the typed line without the line ending.
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Show a message to the user.
    fn say(&mut self, message: &str);
}

/// Prompts on stdout, reads from stdin.
#[derive(Debug, Default)]
pub struct StdinInput;

impl InputProvider for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        let n = std::io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Err(anyhow!("input closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }
}

/// Liked songs first, then every playlist of the user.
pub async fn build_menu(source: &dyn SourceCatalog) -> Result<Vec<CollectionSummary>> {
    let mut menu = vec![CollectionSummary {
        reference: CollectionRef::Liked,
        name: LIKED_SONGS_LABEL.to_string(),
        track_count: source.liked_total().await?,
    }];
    menu.extend(source.list_playlists().await?);
    Ok(menu)
}

pub fn render_menu(menu: &[CollectionSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<4} {:<width$} {}", "#", "Name", "Tracks", width = NAME_WIDTH);
    let _ = writeln!(out, "{}", "-".repeat(60));
    for (i, c) in menu.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<4} {:<width$} {}",
            i + 1,
            truncate(&c.name, NAME_WIDTH),
            c.track_count,
            width = NAME_WIDTH
        );
    }
    let _ = write!(out, "{}", "-".repeat(60));
    out
}

/// Ask for a menu number until a valid one is typed.
pub fn select_collection<'m>(
    input: &mut dyn InputProvider,
    menu: &'m [CollectionSummary],
) -> Result<&'m CollectionSummary> {
    if menu.is_empty() {
        bail!("no playlists found");
    }
    loop {
        let line = input.read_line("\n👉 Enter the NUMBER of the playlist to migrate: ")?;
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=menu.len()).contains(&n) => {
                let chosen = &menu[n - 1];
                input.say(&format!("\n✅ Selected: {}", chosen.name));
                return Ok(chosen);
            }
            Ok(_) => input.say("❌ Number out of range."),
            Err(_) => input.say("❌ Please enter a valid number."),
        }
    }
}

/// Anything but "y"/"yes" declines.
pub fn confirm_migration(
    input: &mut dyn InputProvider,
    track_count: usize,
    destination: &str,
) -> Result<bool> {
    let answer = input.read_line(&format!(
        "\nMigrate {} tracks to {} now? (y/n): ",
        track_count, destination
    ))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Empty input keeps `default`.
pub fn choose_playlist_name(
    input: &mut dyn InputProvider,
    destination: &str,
    default: &str,
) -> Result<String> {
    let name = input.read_line(&format!(
        "Name for the {} playlist [{}]: ",
        destination, default
    ))?;
    let name = name.trim();
    Ok(if name.is_empty() {
        default.to_string()
    } else {
        name.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        lines: VecDeque<&'static str>,
        said: Vec<String>,
    }

    impl Scripted {
        fn new(lines: &[&'static str]) -> Self {
            Self { lines: lines.iter().copied().collect(), said: Vec::new() }
        }
    }

    impl InputProvider for Scripted {
        fn read_line(&mut self, _prompt: &str) -> Result<String> {
            self.lines
                .pop_front()
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow!("input closed"))
        }

        fn say(&mut self, message: &str) {
            self.said.push(message.to_string());
        }
    }

    fn menu() -> Vec<CollectionSummary> {
        vec![
            CollectionSummary {
                reference: CollectionRef::Liked,
                name: LIKED_SONGS_LABEL.into(),
                track_count: 812,
            },
            CollectionSummary {
                reference: CollectionRef::Playlist("pl1".into()),
                name: "Road trip".into(),
                track_count: 42,
            },
        ]
    }

    #[test]
    fn selection_reprompts_until_valid() {
        let m = menu();
        let mut input = Scripted::new(&["abc", "7", "0", "2"]);
        let chosen = select_collection(&mut input, &m).unwrap();
        assert_eq!(chosen.reference, CollectionRef::Playlist("pl1".into()));
        assert_eq!(input.said[0], "❌ Please enter a valid number.");
        assert_eq!(input.said[1], "❌ Number out of range.");
        assert_eq!(input.said[2], "❌ Number out of range.");
    }

    #[test]
    fn selection_fails_when_input_closes() {
        let m = menu();
        let mut input = Scripted::new(&["nope"]);
        assert!(select_collection(&mut input, &m).is_err());
    }

    #[test]
    fn confirm_and_name_prompts() {
        let mut input = Scripted::new(&["Y", "n", "", "  Summer  "]);
        assert!(confirm_migration(&mut input, 3, "TIDAL").unwrap());
        assert!(!confirm_migration(&mut input, 3, "TIDAL").unwrap());
        assert_eq!(choose_playlist_name(&mut input, "TIDAL", "Road trip").unwrap(), "Road trip");
        assert_eq!(choose_playlist_name(&mut input, "TIDAL", "Road trip").unwrap(), "Summer");
    }

    #[test]
    fn menu_table_truncates_long_names() {
        let mut m = menu();
        m[1].name = "x".repeat(60);
        let table = render_menu(&m);
        assert!(table.starts_with("#    Name"));
        assert!(table.contains(&format!("{}...", "x".repeat(37))));
        assert!(!table.contains(&"x".repeat(38)));
    }
}
