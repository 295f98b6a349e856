use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::domain::RVError;
use crate::record::{FieldValue, Record, RecordId};

pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub modified: Option<SystemTime>,
    file_type: FileType,
}

pub fn get_file_info(path: &Path) -> Result<FileInfo, RVError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RVError::FileNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => RVError::PermissionDenied(path.to_path_buf()),
        _ => RVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(RVError::LoadingFailed(format!(
            "{} is not a file",
            path.display()
        )));
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
        modified: metadata.modified().ok(),
        file_type: detect_file_type(path)?,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, RVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(RVError::UnknownFileType(path.to_path_buf())),
    }
}

fn load_frame(info: &FileInfo) -> Result<DataFrame, RVError> {
    let path = PlPath::Local(info.path.as_path().into());
    let frame = match info.file_type {
        FileType::CSV => LazyCsvReader::new(path).with_has_header(true).finish()?,
        FileType::PARQUET => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
        FileType::ARROW => LazyFrame::scan_ipc(
            path,
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )?,
    };
    Ok(frame.collect()?)
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Reads one column as cell values. Numeric columns become numbers, all
/// other types are carried as their string rendering.
fn load_column(df: &DataFrame, name: &str) -> Result<Vec<FieldValue>, PolarsError> {
    let column = df.column(name)?;
    let numeric = is_numeric_type(column.dtype());
    let as_text = column.cast(&DataType::String)?;
    let values = as_text
        .str()?
        .into_iter()
        .map(|value| match value {
            None => FieldValue::Missing,
            Some(s) if numeric => s
                .parse::<f64>()
                .map(FieldValue::Number)
                .unwrap_or_else(|_| FieldValue::Text(s.to_string())),
            Some(s) => FieldValue::Text(s.to_string()),
        })
        .collect();
    Ok(values)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<String>, RVError> {
    if !column_names(df).iter().any(|c| c == name) {
        return Err(RVError::MissingColumn(name.to_string()));
    }
    Ok(load_column(df, name)?
        .into_iter()
        .map(|v| v.to_string())
        .collect())
}

/// Loads the record collection. Requires an `id` column; every other column
/// becomes a named field.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_records(path: &Path) -> Result<Vec<Record>, RVError> {
    let info = get_file_info(path)?;
    let start_time = Instant::now();
    let df = load_frame(&info)?;

    let ids = text_column(&df, ID_COLUMN)?;
    let names: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|n| n != ID_COLUMN)
        .collect();

    // Each column is converted on its own thread.
    let columns: Result<Vec<(String, Vec<FieldValue>)>, PolarsError> = names
        .par_iter()
        .map(|name| load_column(&df, name).map(|values| (name.clone(), values)))
        .collect();
    let columns = columns?;

    let mut records: Vec<Record> = ids.into_iter().map(Record::new).collect();
    for (name, values) in columns {
        for (record, value) in records.iter_mut().zip(values) {
            if !matches!(value, FieldValue::Missing) {
                record.set(&name, value);
            }
        }
    }

    let mut seen = HashSet::with_capacity(records.len());
    if let Some(dup) = records.iter().find(|r| !seen.insert(r.id.as_str())) {
        return Err(RVError::LoadingFailed(format!(
            "duplicate record id \"{}\"",
            dup.id
        )));
    }

    info!(
        "Loaded {} records ({} bytes) in {}ms",
        records.len(),
        info.file_size,
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

/// Loads `id -> label` pairs. The label is the `name` or `label` column,
/// falling back to the second column.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_lookup(path: &Path) -> Result<HashMap<String, String>, RVError> {
    let info = get_file_info(path)?;
    let df = load_frame(&info)?;
    let names = column_names(&df);
    let label_column = names
        .iter()
        .find(|n| n.as_str() == "name" || n.as_str() == "label")
        .or_else(|| names.iter().find(|n| n.as_str() != ID_COLUMN))
        .cloned()
        .ok_or_else(|| RVError::MissingColumn("name".into()))?;

    let lookup: HashMap<String, String> = text_column(&df, ID_COLUMN)?
        .into_iter()
        .zip(text_column(&df, &label_column)?)
        .collect();
    debug!("Loaded {} lookup labels from column {label_column}", lookup.len());
    Ok(lookup)
}

/// Loads the identifiers currently online from the `id` column.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_presence(path: &Path) -> Result<HashSet<RecordId>, RVError> {
    let info = get_file_info(path)?;
    let df = load_frame(&info)?;
    let live: HashSet<RecordId> = text_column(&df, ID_COLUMN)?
        .into_iter()
        .filter(|id| !id.is_empty())
        .collect();
    debug!("{} identifiers online", live.len());
    Ok(live)
}
