use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Listing {url} returned status {status}")]
    ListingStatus { url: String, status: u16 },

    #[error("Download of {url} returned status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not decode {path} with any of [{tried}]")]
    Undecodable { path: PathBuf, tried: String },

    #[error("Invalid quarter {quarter} for year {year}")]
    InvalidQuarter { year: i32, quarter: u8 },

    #[error("No quarter archives discovered under {0}")]
    NoQuarters(String),

    #[error("No quarter archive could be downloaded")]
    NoArchives,

    #[error("No expense records produced from {archives} archive(s); check the archive layout")]
    NoRecords { archives: usize },

    #[error("Consolidated file not found: {0}; run the consolidate step first")]
    MissingConsolidated(PathBuf),
}

impl PipelineError {
    /// True for the conditions that abort a run rather than skip one input.
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::NoQuarters(_)
                | PipelineError::NoArchives
                | PipelineError::NoRecords { .. }
                | PipelineError::ListingStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
