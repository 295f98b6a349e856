use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
rosterview key bindings

  ←/→/↑/↓      move selection
  n / PgDown   next page
  p / PgUp     previous page
  g / G        first / last page
  /            search (live, Esc restores, Enter keeps)
  s            sort by selected column, again to flip direction
  f            toggle filter on the selected cell's value
  F            clear all filters
  y            copy selected row as CSV
  r            reload presence file
  ?            this help
  Esc          close popup
  q            quit";

/// Runtime configuration assembled from the command line.
#[derive(Debug, Clone)]
pub struct RVConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub max_column_width: usize,
    pub presence_path: Option<PathBuf>,
}

impl Default for RVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            page_size: 25,
            max_column_width: 32,
            presence_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Search,
}

/// User intents produced by the controller and consumed by `Model::update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    Search,
    SortColumn,
    ToggleFilter,
    ClearFilters,
    CopyRow,
    ReloadPresence,
    Help,
    Exit,
    Tick,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug)]
pub enum RVError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    MissingColumn(String),
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    UnknownFileType(PathBuf),
}

impl fmt::Display for RVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RVError::IoError(e) => write!(f, "i/o error: {e}"),
            RVError::PolarsError(e) => write!(f, "failed to read table: {e}"),
            RVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            RVError::MissingColumn(name) => write!(f, "missing column \"{name}\""),
            RVError::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            RVError::PermissionDenied(p) => write!(f, "permission denied: {}", p.display()),
            RVError::UnknownFileType(p) => write!(f, "unknown file type: {}", p.display()),
        }
    }
}

impl std::error::Error for RVError {}

impl From<Error> for RVError {
    fn from(err: Error) -> Self {
        RVError::IoError(err)
    }
}

impl From<PolarsError> for RVError {
    fn from(err: PolarsError) -> Self {
        RVError::PolarsError(err)
    }
}
