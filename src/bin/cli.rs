use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use spotify_tidal_migrator as lib;
use lib::api::spotify::SpotifyProvider;
use lib::api::tidal::TidalProvider;
use lib::api::SourceCatalog;
use lib::config::Config;
use lib::migrator::{ItemProgress, Migrator};
use lib::models::{CollectionRef, CollectionSummary};
use lib::pacing::FixedDelay;
use lib::select::{self, InputProvider, StdinInput};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "spotify-tidal-migrator", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a Spotify playlist (or liked songs) into a new TIDAL playlist
    Migrate {
        /// Spotify playlist id, or "liked" for saved tracks. Prompts when omitted.
        #[arg(long)]
        collection: Option<String>,

        /// Name of the TIDAL playlist. Prompts when omitted.
        #[arg(long)]
        name: Option<String>,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// List liked songs and playlists with their track counts
    List,
    /// Auth helpers
    Auth {
        #[command(subcommand)]
        sub: AuthCommands,
    },
    /// Validate config file and exit
    ConfigValidate,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Authorize Spotify and store tokens in DB (interactive)
    Spotify,
    /// Store a TIDAL token in DB (interactive)
    Tidal,
}

/// Logs go to stderr and to a daily-rotated file in cfg.log_dir.
fn init_logging(cfg: &Config) -> Result<WorkerGuard> {
    let _ = LogTracer::init();
    let file_appender = tracing_appender::rolling::daily(&cfg.log_dir, "migrator.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber_global::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to set global tracing subscriber: {}", e))?;
    Ok(guard)
}

fn spotify_from(cfg: &Config) -> SpotifyProvider {
    // Empty client credentials are loaded from the DB.
    SpotifyProvider::new(String::new(), String::new(), cfg.db_path.clone())
        .with_page_sizes(cfg.playlist_page_size, cfg.liked_page_size)
}

fn tidal_from(cfg: &Config) -> TidalProvider {
    TidalProvider::new(
        String::new(),
        String::new(),
        cfg.db_path.clone(),
        cfg.tidal_country_code.clone(),
    )
}

/// Resolve `--collection` to a menu entry, or ask the user to pick one.
fn choose_collection(
    input: &mut dyn InputProvider,
    menu: &[CollectionSummary],
    flag: Option<&str>,
) -> Result<CollectionSummary> {
    match flag {
        Some(raw) => {
            let wanted: CollectionRef = raw.parse()?;
            Ok(menu
                .iter()
                .find(|c| c.reference == wanted)
                .cloned()
                .unwrap_or(CollectionSummary {
                    name: wanted.to_string(),
                    reference: wanted,
                    track_count: 0,
                }))
        }
        None => {
            input.say(&select::render_menu(menu));
            select::select_collection(input, menu).cloned()
        }
    }
}

async fn run_migrate(
    cfg: &Config,
    collection: Option<String>,
    name: Option<String>,
    yes: bool,
) -> Result<()> {
    let mut input = StdinInput;
    let spotify = spotify_from(cfg);
    if !spotify.is_authenticated() {
        return Err(anyhow!("Spotify is not authenticated. Run `auth spotify` first."));
    }
    let tidal = tidal_from(cfg);
    if !tidal.is_authenticated() {
        return Err(anyhow!("TIDAL is not authenticated. Run `auth tidal` first."));
    }
    tidal.check_login().await.context("checking TIDAL login")?;

    let user = spotify
        .current_user_display_name()
        .await
        .context("fetching Spotify profile")?;
    println!("✅ Connected as: {}", user);

    let menu = select::build_menu(&spotify).await.context("listing Spotify collections")?;
    let chosen = choose_collection(&mut input, &menu, collection.as_deref())?;

    println!("\n⏳ Fetching tracks from {}...", chosen.name);
    let tracks = lib::reader::read_collection(&spotify, chosen.reference.clone())
        .await
        .with_context(|| format!("reading {}", chosen.reference))?;
    if tracks.is_empty() {
        println!("⚠️ The playlist is empty. Nothing to migrate.");
        return Ok(());
    }
    println!("📦 {} tracks found.", tracks.len());

    if !yes && !select::confirm_migration(&mut input, tracks.len(), "TIDAL")? {
        println!("Cancelled.");
        return Ok(());
    }
    let playlist_name = match name {
        Some(n) => n,
        None => select::choose_playlist_name(&mut input, "TIDAL", &chosen.name)?,
    };

    let migrator = Migrator::new(Arc::new(tidal), cfg.playlist_description.clone())
        .with_pacer(Arc::new(FixedDelay(cfg.item_delay())))
        .with_progress(Box::new(|p: &ItemProgress<'_>| {
            println!("{}", lib::report::progress_line(p))
        }));
    let outcome = migrator.run(&playlist_name, &tracks).await?;
    println!("\n{}", lib::report::render_summary(&outcome));
    Ok(())
}

async fn run_list(cfg: &Config) -> Result<()> {
    let spotify = spotify_from(cfg);
    if !spotify.is_authenticated() {
        return Err(anyhow!("Spotify is not authenticated. Run `auth spotify` first."));
    }
    let menu = select::build_menu(&spotify).await?;
    println!("{}", select::render_menu(&menu));
    tracing::info!("Listed {} collections from {}", menu.len(), spotify.name());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::ConfigValidate = cli.command {
        match Config::load(cli.config.as_deref()) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let cfg = Config::load(cli.config.as_deref()).context("loading config")?;
    let _guard = init_logging(&cfg)?;

    match cli.command {
        Commands::Migrate { collection, name, yes } => {
            run_migrate(&cfg, collection, name, yes)
                .await
                .context("running migration")?;
        }
        Commands::List => run_list(&cfg).await?,
        Commands::Auth { sub } => {
            let mut input = StdinInput;
            match sub {
                AuthCommands::Spotify => {
                    lib::api::spotify_auth::run_spotify_auth(&cfg, &mut input).await?
                }
                AuthCommands::Tidal => {
                    lib::api::tidal_auth::run_tidal_auth(&cfg, &mut input).await?
                }
            }
        }
        Commands::ConfigValidate => {}
    }

    Ok(())
}
