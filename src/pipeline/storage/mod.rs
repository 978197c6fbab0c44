// Pipeline storage: the CSV/zip hand-off files and the run summary

pub mod csv_store;
pub mod run_summary;

pub use csv_store::{package_zip, read_consolidated_csv, write_aggregated_csv, write_consolidated_csv};
pub use run_summary::RunSummary;
