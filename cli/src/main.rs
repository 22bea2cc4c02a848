//! `infinite-craft` command-line front end.

mod mock;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use craft_client::{ClientConfig, CraftElement, Element, InfiniteCraft};
use craft_config::CraftConfig;
use craft_store::{DiscoveryStore, StoreOptions};
use craft_utils::expand_path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DISPLAY_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));
const GAME_URL: &str = "https://neal.fun/infinite-craft/";

#[derive(Parser)]
#[command(name = "infinite-craft")]
#[command(about = "Client for Neal Agarwal's Infinite Craft")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Display the version and exit
    #[arg(short = 'V', long)]
    version: bool,

    /// Display program information and exit
    #[arg(short = 'I', long)]
    information: bool,

    /// Config file (default: ~/.infinite-craft/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Reset the discoveries file to the four starting elements
    Reset {
        /// Path to the discoveries file (must already exist)
        #[arg(short, long, value_name = "PATH")]
        discoveries: Option<String>,
    },
    /// Combine two elements
    Pair {
        first: String,
        second: String,
        /// Do not record the result in the discoveries file
        #[arg(long)]
        no_store: bool,
    },
    /// Measure the round trip of one pairing request
    Ping,
    /// List stored discoveries
    Discoveries {
        /// Only elements this client discovered first
        #[arg(long)]
        first_only: bool,
    },
    /// Serve a local stand-in for the pairing endpoint
    Mock {
        /// Hostname to bind
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind
        #[arg(short, long, visible_short_alias = 'P', default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Option<CraftConfig>> {
    match path {
        Some(path) => CraftConfig::load_from(path)
            .map(Some)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => CraftConfig::load().context("failed to load config"),
    }
}

/// Load the config file (if any) and resolve it into client settings.
fn resolve_config(path: Option<&Path>) -> Result<ClientConfig> {
    match load_config(path)? {
        Some(file) => ClientConfig::from_config(&file).context("invalid configuration"),
        None => Ok(ClientConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config errors are reported after tracing is up so they are not lost.
    let config = resolve_config(cli.config.as_deref());
    init_tracing(cli.debug || config.as_ref().is_ok_and(ClientConfig::debug));
    let config = config?;

    if cli.version {
        println!("{DISPLAY_VERSION}");
        return Ok(());
    }
    if cli.information {
        print_information();
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Command::Reset { discoveries } => reset(&config, discoveries.as_deref()),
        Command::Pair {
            first,
            second,
            no_store,
        } => pair(config, &first, &second, !no_store).await,
        Command::Ping => ping(config).await,
        Command::Discoveries { first_only } => list_discoveries(&config, first_only),
        Command::Mock { host, port } => mock::run(&host, port).await,
    }
}

fn print_information() {
    println!("{DISPLAY_VERSION}");
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();
    println!("Play Infinite Craft by Neal Agarwal in your browser: {GAME_URL}");
}

fn reset(config: &ClientConfig, discoveries: Option<&str>) -> Result<()> {
    let path = match discoveries {
        Some(raw) => expand_path(raw),
        None => config.discoveries_path().to_path_buf(),
    };

    if !path.exists() {
        bail!("file '{}' not found", path.display());
    }

    let store = DiscoveryStore::new(
        &path,
        StoreOptions {
            make_file: false,
            ..config.store_options()
        },
    );
    store
        .reset()
        .with_context(|| format!("failed to reset {}", path.display()))?;

    println!("\"{}\" file contents reset successfully.", path.display());
    Ok(())
}

async fn pair(config: ClientConfig, first: &str, second: &str, store: bool) -> Result<()> {
    let client = InfiniteCraft::new(config)?;
    let first = Element::new(first);
    let second = Element::new(second);

    let result = client
        .scope(|game| Box::pin(async move { game.pair_with(&first, &second, store).await }))
        .await
        .context("pairing failed")?;

    if result.is_first_discovery() == Some(true) {
        println!("{result} (first discovery!)");
    } else {
        println!("{result}");
    }
    Ok(())
}

async fn ping(config: ClientConfig) -> Result<()> {
    let client = InfiniteCraft::new(config)?;
    let elapsed = client
        .scope(|game| Box::pin(async move { game.ping().await }))
        .await
        .context("ping failed")?;

    println!("Pong! {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

/// Read the discoveries file as it is. Unlike building a client, a missing
/// file is an error and is never created or reseeded.
fn stored_discoveries(config: &ClientConfig, first_only: bool) -> Result<Vec<Element>> {
    let store = DiscoveryStore::new(config.discoveries_path(), config.store_options());
    let records = if first_only {
        store.load_where(|r| r.is_first_discovery)
    } else {
        store.load()
    }
    .with_context(|| format!("failed to read {}", store.path().display()))?;

    Ok(records.iter().map(Element::from_record).collect())
}

fn list_discoveries(config: &ClientConfig, first_only: bool) -> Result<()> {
    let discoveries = stored_discoveries(config, first_only)?;
    for element in &discoveries {
        println!("{element}");
    }
    tracing::debug!(
        count = discoveries.len(),
        path = %config.discoveries_path().display(),
        "Listed discoveries"
    );
    Ok(())
}
