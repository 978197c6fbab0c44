// Pipeline ingestion: archive discovery, download and extraction

pub mod discovery;
pub mod download;
pub mod extract;

pub use discovery::ArchiveDiscovery;
pub use download::{download_archives, fetch_registry};
pub use extract::extract_archive;
