use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rosterview::controller::Controller;
use rosterview::domain::{RVConfig, RVError};
use rosterview::loader::{load_lookup, load_presence, load_records};
use rosterview::model::{Model, Status};
use rosterview::record::Auxiliary;
use rosterview::schema::TableSchema;
use rosterview::ui::TableUI;

/// A terminal roster viewer: search, filter, sort and page through students,
/// sections or assessment attempts.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Records file (csv, parquet or arrow ipc) with an `id` column.
    path: String,

    /// Which screen layout to use for the records.
    #[arg(short, long, default_value = "students", value_parser = ["students", "sections", "attempts"])]
    entity: String,

    /// Lookup file mapping group ids to labels (`id` plus `name` or `label`).
    #[arg(short, long)]
    lookup: Option<String>,

    /// File listing the ids currently online. Re-read when it changes.
    #[arg(short, long)]
    presence: Option<String>,

    #[arg(long, default_value_t = 25)]
    page_size: usize,

    #[arg(long, default_value_t = 32)]
    max_column_width: usize,

    /// Event poll interval in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Write logs to this file. Level is taken from RUST_LOG (default info).
    #[arg(long)]
    log: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(path: &str) -> Result<PathBuf, RVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| RVError::LoadingFailed(format!("cannot expand {path}: {e}")))
}

fn init_logging(log: Option<&PathBuf>) -> Result<(), RVError> {
    let file_layer = match log {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(File::create(path)?)),
        ),
        None => None,
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run() -> Result<(), RVError> {
    let args = Args::parse();
    let log = args.log.as_deref().map(expand_path).transpose()?;
    init_logging(log.as_ref())?;
    info!("Starting rosterview with {args:?}");

    let schema = TableSchema::by_name(&args.entity)
        .ok_or_else(|| RVError::LoadingFailed(format!("unknown entity {}", args.entity)))?;

    let records = load_records(&expand_path(&args.path)?)?;
    let lookup = match &args.lookup {
        Some(p) => load_lookup(&expand_path(p)?)?,
        None => Default::default(),
    };
    let presence_path = args.presence.as_deref().map(expand_path).transpose()?;
    let live = match &presence_path {
        Some(p) => load_presence(p)?,
        None => Default::default(),
    };

    let cfg = RVConfig {
        event_poll_time: args.poll_ms,
        page_size: args.page_size,
        max_column_width: args.max_column_width,
        presence_path,
    };

    let mut model = Model::init(&cfg, schema, records, Auxiliary::new(lookup, live));
    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), RVError> {
        while model.status != Status::QUITTING {
            terminal.draw(|f| ui.draw(&model, f))?;
            let message = controller.handle_event(&model)?;
            model.update(message)?;
        }
        Ok(())
    })();
    ratatui::restore();
    result
}
