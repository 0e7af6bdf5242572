use thiserror::Error;

/// Why an uploaded file could not be turned into a table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("reading file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported JSON structure: {0}")]
    UnsupportedJson(&'static str),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(String),

    #[error("spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// A filter request that cannot be evaluated against the current table.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("invalid filter on '{column}': {reason}")]
    MalformedPredicate { column: String, reason: String },
}
