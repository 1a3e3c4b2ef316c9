use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{ApiClient, EntryBackend};
use crate::app::EntryStore;
use crate::config::{AppConfig, BackendKind, ConfigLoader};
use crate::dates;
use crate::storage::{self, LocalBackend, PreferenceStore};

pub mod commands;

use self::commands::{
    AddArgs, BlurArgs, DeleteArgs, EditArgs, ExportArgs, ListArgs, Session, ShowArgs, ThemeArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "diary",
    version,
    about = "Personal work diary with daily grouping, search and PDF export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over DIARY_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over DIARY_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Use the local database even when the config selects the remote server
    #[arg(long)]
    pub local: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a month of entries grouped by day (default)
    List(ListArgs),
    /// Record a new entry
    Add(AddArgs),
    /// Change the time or text of an entry
    Edit(EditArgs),
    /// Delete an entry after confirmation
    Delete(DeleteArgs),
    /// Save one day's entries as a PDF
    Export(ExportArgs),
    /// Print an entry with its raw markdown
    Show(ShowArgs),
    /// Hide or reveal entry text in listings
    Blur(BlurArgs),
    /// Switch between the light and dark palette
    Theme(ThemeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("DIARY_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("DIARY_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let prefs = PreferenceStore::open(&paths.prefs_file);
    let export_dir = config.export.directory_or(&paths.export_dir);

    let command = cli
        .command
        .unwrap_or_else(|| Commands::List(ListArgs::default()));

    // preference commands never touch a backend
    let command = match command {
        Commands::Blur(args) => return commands::print(commands::run_blur(&prefs, &args)),
        Commands::Theme(args) => return commands::print(commands::run_theme(&prefs, &args)),
        other => other,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let backend = if cli.local {
        BackendKind::Local
    } else {
        config.backend
    };
    tracing::debug!(%backend, "selected entry backend");
    match backend {
        BackendKind::Local => {
            let handle = storage::init(&config.storage)?;
            let session = session(LocalBackend::new(handle), config, prefs, export_dir);
            runtime.block_on(commands::execute(&session, command))
        }
        BackendKind::Remote => {
            let client = ApiClient::new(&config.api).context("building HTTP client")?;
            let session = session(client, config, prefs, export_dir);
            runtime.block_on(commands::execute(&session, command))
        }
    }
}

fn session<B: EntryBackend>(
    backend: B,
    config: AppConfig,
    prefs: PreferenceStore,
    export_dir: PathBuf,
) -> Session<B> {
    Session {
        store: EntryStore::new(backend, dates::current_month_key()),
        color: config.display.color && atty::is(atty::Stream::Stdout),
        config,
        prefs,
        export_dir,
        interactive: atty::is(atty::Stream::Stdin),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
