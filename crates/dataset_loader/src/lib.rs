use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;

pub mod batch;

pub use batch::{BatchDriver, BatchReport, InspectedCase};

pub const DEFAULT_COLUMN: &str = "source";
pub const DEFAULT_UNTIL: usize = 4;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No dataset location configured (set DATASET_URL or [dataset].location)")]
    NoLocation,
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to download dataset from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Dataset server at {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Column `{column}` not found in dataset (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("Failed to write test cases to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Local CSV path or `http(s)://` URL.
    pub location: Option<String>,
    pub column: String,
    pub until: usize,
    pub test_case_output: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            location: None,
            column: DEFAULT_COLUMN.to_string(),
            until: DEFAULT_UNTIL,
            test_case_output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetLocation {
    Path(PathBuf),
    Url(String),
}

impl DatasetLocation {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DatasetLocation::Url(raw.to_string())
        } else {
            DatasetLocation::Path(PathBuf::from(raw))
        }
    }
}

/// Load one column of a CSV dataset from a file or URL.
pub async fn load_sources(location: &str, column: &str) -> Result<Vec<String>, DatasetError> {
    match DatasetLocation::parse(location) {
        DatasetLocation::Path(path) => {
            info!("Loading dataset from {:?}", path);
            let file = File::open(&path).map_err(|e| {
                error!("Failed to open dataset {:?}: {}", path, e);
                DatasetError::Io {
                    path: path.clone(),
                    source: e,
                }
            })?;
            read_column(file, column)
        }
        DatasetLocation::Url(url) => {
            info!("Downloading dataset from {}", url);
            let body = fetch(&url).await?;
            read_column(body.as_bytes(), column)
        }
    }
}

async fn fetch(url: &str) -> Result<String, DatasetError> {
    let http_err = |e: reqwest::Error| DatasetError::Http {
        url: url.to_string(),
        source: e,
    };
    let response = reqwest::get(url).await.map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        error!("Dataset download failed with status {}", status);
        return Err(DatasetError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(http_err)
}

/// Values of `column` for every record, in file order.
pub fn read_column<R: std::io::Read>(reader: R, column: &str) -> Result<Vec<String>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let Some(index) = headers.iter().position(|h| h.trim() == column) else {
        return Err(DatasetError::MissingColumn {
            column: column.to_string(),
            available: headers.iter().map(str::to_string).collect(),
        });
    };

    let mut values = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        values.push(record.get(index).unwrap_or_default().to_string());
    }
    debug!("Read {} values from column `{}`", values.len(), column);
    Ok(values)
}
