use std::io::Write;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dexplorer_core::provider::pokeapi::PokeApi;
use dexplorer_core::view::{LoadMore, SuppressReason};
use dexplorer_core::{CatalogClient, Category, Config, Direction, Session, SortMode, config_file};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Dexplorer - browse, search and inspect the species catalog from the terminal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog entries, optionally filtered and sorted
    List {
        /// Case-insensitive name substring, or digits of the catalog number
        #[arg(short, long)]
        search: Option<String>,

        /// Category filter (at most two, exact match), e.g. --type fire,flying
        #[arg(short = 't', long = "type", value_delimiter = ',')]
        types: Vec<Category>,

        /// Sort order
        #[arg(long, value_enum, default_value_t = SortArg::Id)]
        sort: SortArg,

        /// Extra pages to load after the first one (ignored while filtering)
        #[arg(short, long, default_value_t = 0)]
        pages: usize,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show the detail panel of one entry
    Show {
        /// Catalog number
        id: u32,

        /// Step to the next entry after opening
        #[arg(long, conflicts_with = "prev")]
        next: bool,

        /// Step to the previous entry after opening
        #[arg(long)]
        prev: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Provider API root (overrides DEXPLORER_API_BASE and config files)
    #[arg(long)]
    api_base: Option<String>,

    /// Per-request timeout in seconds (overrides DEXPLORER_TIMEOUT)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Id,
    Name,
}

impl From<SortArg> for SortMode {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Id => SortMode::ByIdentifier,
            SortArg::Name => SortMode::ByName,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::List {
            search,
            types,
            sort,
            pages,
            common,
        } => list(search, types, sort.into(), pages, common).await,
        Command::Show {
            id,
            next,
            prev,
            common,
        } => {
            let step = match (next, prev) {
                (true, _) => Some(Direction::Next),
                (_, true) => Some(Direction::Previous),
                _ => None,
            };
            show(id, step, common).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration: CLI flags > env vars > config files > defaults.
fn resolve_config(common: &CommonArgs) -> anyhow::Result<Config> {
    let mut config = Config::default();
    config_file::load_config().apply(&mut config)?;

    if let Ok(api_base) = std::env::var("DEXPLORER_API_BASE") {
        config.api_base = api_base;
    }
    if let Some(timeout) = std::env::var("DEXPLORER_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.request_timeout_secs = timeout;
    }

    if let Some(api_base) = &common.api_base {
        config.api_base = api_base.clone();
    }
    if let Some(timeout) = common.timeout {
        config.request_timeout_secs = timeout;
    }

    config.validate()?;
    Ok(config)
}

fn open_session(config: &Config) -> anyhow::Result<Session> {
    let provider = Arc::new(PokeApi::new(config)?);
    let client = Arc::new(CatalogClient::new(provider, config));
    Ok(Session::new(client, config))
}

/// Drive the session until idle, or bail out on Ctrl+C.
async fn settle(session: &mut Session) -> anyhow::Result<()> {
    tokio::select! {
        _ = session.settle() => Ok(()),
        _ = tokio::signal::ctrl_c() => {
            session.shutdown();
            anyhow::bail!("interrupted")
        }
    }
}

async fn list(
    search: Option<String>,
    types: Vec<Category>,
    sort: SortMode,
    pages: usize,
    common: CommonArgs,
) -> anyhow::Result<()> {
    let config = resolve_config(&common)?;
    let color = ColorMode(!common.no_color);
    let mut session = open_session(&config)?;

    session.mount();
    settle(&mut session).await?;
    if !session.view().index_loaded() {
        tracing::warn!("full index unavailable, asking once more");
        session.retry_index();
        settle(&mut session).await?;
    }
    if !session.view().index_loaded() {
        tracing::warn!("full index unavailable; results are limited to fetched pages");
    }

    session.on_sort_mode_change(sort);
    session.on_categories_change(&types)?;
    if let Some(text) = &search {
        session.on_filter_text_change(text);
    }
    settle(&mut session).await?;

    for _ in 0..pages {
        match session.on_load_more_requested() {
            LoadMore::Appended(_) => {}
            LoadMore::Fetching(_) => settle(&mut session).await?,
            LoadMore::Suppressed(SuppressReason::Exhausted | SuppressReason::FilterActive) => break,
            LoadMore::Suppressed(reason) => {
                tracing::debug!(?reason, "load more suppressed");
                break;
            }
        }
    }

    let mut stdout = std::io::stdout().lock();
    output::print_list(&mut stdout, &session.list(), color)?;
    stdout.flush()?;
    Ok(())
}

async fn show(id: u32, step: Option<Direction>, common: CommonArgs) -> anyhow::Result<()> {
    let config = resolve_config(&common)?;
    let color = ColorMode(!common.no_color);
    let mut session = open_session(&config)?;

    if !(1..=config.max_id).contains(&id) {
        anyhow::bail!("catalog numbers run from 1 to {}", config.max_id);
    }
    session.open_by_id(id);
    settle(&mut session).await?;
    if session.selection().selection.is_none() {
        anyhow::bail!("could not load entry {id}");
    }

    if let Some(direction) = step {
        session.on_navigate(direction);
        settle(&mut session).await?;
    }

    let mut stdout = std::io::stdout().lock();
    output::print_detail(&mut stdout, &session.selection(), color)?;
    stdout.flush()?;
    Ok(())
}
