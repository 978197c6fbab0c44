// Data processing pipeline: ingestion, processing, and storage

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod storage;

pub use orchestrator::{ConsolidationPipeline, ConsolidationReport, TransformPipeline, TransformReport};
