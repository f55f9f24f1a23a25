//! Forage - find geocaches near you and keep them for offline browsing.

mod view;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use forage_core::config::HomeLocation;
use forage_core::{
    Config, FetchOrchestrator, FixedLocation, JsonStore, ListController, LocalStore, OkApiClient,
    Stage, TcpProbe,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use view::ConsoleView;

#[derive(Parser)]
#[command(
    name = "forage",
    about = "Find geocaches near you and keep them for offline browsing",
    version
)]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true, env = "FORAGE_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download caches near your location into the local store
    Refresh {
        /// Search around this latitude instead of the configured home
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Search around this longitude instead of the configured home
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Retry this many times on retryable failures
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// List stored caches
    List,

    /// Show one stored cache by its list index
    Show { index: usize },

    /// Remove all stored caches
    Clear,

    /// Show or update configuration
    Config {
        /// Home position as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        set_home: Option<String>,

        /// OKAPI consumer key
        #[arg(long)]
        consumer_key: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "forage.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref());

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    match cli.command {
        Commands::Refresh { lat, lon, retries } => {
            let home = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(HomeLocation::new(lat, lon)),
                _ => config.home,
            };
            refresh(&config, home, retries).await
        }
        Commands::List => list(&config),
        Commands::Show { index } => show(&config, index),
        Commands::Clear => clear(&config).await,
        Commands::Config {
            set_home,
            consumer_key,
        } => update_config(&mut config, set_home, consumer_key),
    }
}

fn open_store(config: &Config) -> Result<Arc<JsonStore>> {
    Ok(Arc::new(JsonStore::open(config.cache_dir()?)?))
}

async fn refresh(config: &Config, home: Option<HomeLocation>, retries: u32) -> Result<ExitCode> {
    let store = open_store(config)?;
    let view = Arc::new(ConsoleView::new(home).without_empty_notice());

    // Attached before fetching so the save's store notification drives the view.
    let mut list = ListController::new(store.clone());
    list.attach(view.clone());

    let orchestrator = FetchOrchestrator::new(
        Arc::new(TcpProbe::new(config.probe_addr.clone())),
        Arc::new(FixedLocation::new(home)),
        Arc::new(OkApiClient::from_config(config)?),
        store.clone(),
        view.clone(),
    );

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let stage = drive_refresh(&orchestrator, retries, interrupted).await;

    let code = match stage {
        Some(Stage::Succeeded) => {
            if view.reported_empty() == Some(false) {
                for (index, record) in list.records().iter().enumerate() {
                    view.print_row(index, record);
                }
            }
            ExitCode::SUCCESS
        }
        Some(Stage::Cancelled) => {
            eprintln!("Cancelled.");
            ExitCode::from(130)
        }
        _ => {
            if let Some(kind) = view.last_failure() {
                info!(%kind, "Refresh failed");
            }
            ExitCode::FAILURE
        }
    };
    list.detach();
    Ok(code)
}

/// Run fetch attempts until one finishes without a retryable failure, the
/// retries run out, or `interrupted` resolves. Returns the final stage.
///
/// `interrupted` is watched from the moment the first attempt starts,
/// including the connectivity check inside `start_fetch`.
async fn drive_refresh(
    orchestrator: &FetchOrchestrator,
    retries: u32,
    interrupted: impl Future<Output = ()>,
) -> Option<Stage> {
    tokio::pin!(interrupted);
    let mut retries_left = retries;

    loop {
        let attempt = async {
            orchestrator.start_fetch().await;
            orchestrator.wait().await
        };

        let stage = tokio::select! {
            stage = attempt => stage,
            _ = &mut interrupted => {
                info!("Interrupted, cancelling fetch");
                orchestrator.cancel();
                return orchestrator.wait().await.or(Some(Stage::Cancelled));
            }
        };

        match stage {
            Some(Stage::Failed(kind)) if kind.offers_retry() && retries_left > 0 => {
                retries_left -= 1;
                eprintln!("Retrying ({} left)...", retries_left);
            }
            other => return other,
        }
    }
}

fn list(config: &Config) -> Result<ExitCode> {
    let store = open_store(config)?;
    let view = Arc::new(ConsoleView::new(config.home));
    let mut list = ListController::new(store.clone());
    list.attach(view.clone());

    for (index, record) in list.records().iter().enumerate() {
        view.print_row(index, record);
    }
    if !list.is_empty() {
        println!("\n{} caches, last updated {}", list.len(), store.age_display());
        if store.is_stale() {
            println!("Stored caches are over an hour old. Run `forage refresh` to update.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn show(config: &Config, index: usize) -> Result<ExitCode> {
    let store = open_store(config)?;
    let view = Arc::new(ConsoleView::new(config.home));
    let mut list = ListController::new(store);
    list.attach(view.clone());

    match list.item_at(index) {
        Ok(record) => {
            view.print_detail(&record);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn clear(config: &Config) -> Result<ExitCode> {
    let store = open_store(config)?;
    let mut list = ListController::new(store.clone());
    list.attach(Arc::new(ConsoleView::new(config.home)));

    let count = list.len();
    store.clear_all().await?;
    info!(count, "Cleared stored caches");
    Ok(ExitCode::SUCCESS)
}

fn update_config(
    config: &mut Config,
    set_home: Option<String>,
    consumer_key: Option<String>,
) -> Result<ExitCode> {
    let changed = set_home.is_some() || consumer_key.is_some();

    if let Some(home) = set_home {
        config.home = Some(parse_home(&home)?);
    }
    if let Some(key) = consumer_key {
        config.consumer_key = Some(key);
    }
    if changed {
        config.save()?;
        println!("Saved {}", Config::config_path()?.display());
    }

    println!("OKAPI URL:     {}", config.okapi_url);
    println!(
        "Consumer key:  {}",
        if config.consumer_key().is_some() { "set" } else { "not set" }
    );
    println!("Search limit:  {}", config.search_limit());
    match config.home {
        Some(home) => println!("Home:          {}, {}", home.latitude, home.longitude),
        None => println!("Home:          not set"),
    }
    println!("Probe address: {}", config.probe_addr);
    Ok(ExitCode::SUCCESS)
}

fn parse_home(s: &str) -> Result<HomeLocation> {
    let Some((lat, lon)) = s.split_once(',') else {
        bail!("Expected \"lat,lon\", got {:?}", s);
    };
    let home = HomeLocation::new(lat.trim().parse()?, lon.trim().parse()?);
    if forage_core::Position::new(home.latitude, home.longitude, home.accuracy).is_err() {
        bail!("Coordinates out of range: {}", s);
    }
    Ok(home)
}
