//! Pipeline metrics recorded through the `metrics` facade.
//!
//! Names follow the Prometheus conventions; `init` installs the Prometheus
//! recorder so the CLI can dump an exposition snapshot after a run.

use std::fmt;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Every metric the pipeline emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Discovery
    DiscoveryListingsFetched,
    DiscoveryQuartersSelected,

    // Ingestion
    ArchivesDownloaded,
    ArchivesFailed,
    ArchiveBytes,
    ArchivesExtracted,

    // Classifier
    ClassifierCandidates,
    ClassifierFallbackUsed,
    ClassifierFilesSkipped,

    // Normalize
    NormalizeFilesParsed,
    NormalizeFilesRejected,
    NormalizeRecords,

    // Consolidate
    ConsolidateRowsDropped,
    ConsolidateDatasetSize,

    // Transform
    TransformRowsRejected,
    TransformGroups,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::DiscoveryListingsFetched => "ans_discovery_listings_fetched_total",
            MetricName::DiscoveryQuartersSelected => "ans_discovery_quarters_selected",
            MetricName::ArchivesDownloaded => "ans_ingest_archives_downloaded_total",
            MetricName::ArchivesFailed => "ans_ingest_archives_failed_total",
            MetricName::ArchiveBytes => "ans_ingest_archive_bytes",
            MetricName::ArchivesExtracted => "ans_ingest_archives_extracted_total",
            MetricName::ClassifierCandidates => "ans_classifier_candidates_total",
            MetricName::ClassifierFallbackUsed => "ans_classifier_fallback_used_total",
            MetricName::ClassifierFilesSkipped => "ans_classifier_files_skipped_total",
            MetricName::NormalizeFilesParsed => "ans_normalize_files_parsed_total",
            MetricName::NormalizeFilesRejected => "ans_normalize_files_rejected_total",
            MetricName::NormalizeRecords => "ans_normalize_records_total",
            MetricName::ConsolidateRowsDropped => "ans_consolidate_rows_dropped_total",
            MetricName::ConsolidateDatasetSize => "ans_consolidate_dataset_size",
            MetricName::TransformRowsRejected => "ans_transform_rows_rejected_total",
            MetricName::TransformGroups => "ans_transform_groups",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs the Prometheus recorder. Call once, from the binary.
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PipelineError::Config(format!("Failed to install Prometheus recorder: {}", e)))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

pub mod discovery {
    use super::MetricName;

    pub fn listing_fetched() {
        ::metrics::counter!(MetricName::DiscoveryListingsFetched.as_str()).increment(1);
    }

    pub fn quarters_selected(count: usize) {
        ::metrics::gauge!(MetricName::DiscoveryQuartersSelected.as_str()).set(count as f64);
    }
}

pub mod ingest {
    use super::MetricName;

    pub fn archive_downloaded(bytes: usize) {
        ::metrics::counter!(MetricName::ArchivesDownloaded.as_str()).increment(1);
        ::metrics::histogram!(MetricName::ArchiveBytes.as_str()).record(bytes as f64);
    }

    pub fn archive_failed(stage: &'static str) {
        ::metrics::counter!(MetricName::ArchivesFailed.as_str(), "stage" => stage).increment(1);
    }

    pub fn archive_extracted() {
        ::metrics::counter!(MetricName::ArchivesExtracted.as_str()).increment(1);
    }
}

pub mod classifier {
    use super::MetricName;

    pub fn candidates(count: usize) {
        ::metrics::counter!(MetricName::ClassifierCandidates.as_str()).increment(count as u64);
    }

    pub fn fallback_used() {
        ::metrics::counter!(MetricName::ClassifierFallbackUsed.as_str()).increment(1);
    }

    pub fn file_skipped() {
        ::metrics::counter!(MetricName::ClassifierFilesSkipped.as_str()).increment(1);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn file_parsed(layout: &'static str, records: usize) {
        ::metrics::counter!(MetricName::NormalizeFilesParsed.as_str(), "layout" => layout).increment(1);
        ::metrics::counter!(MetricName::NormalizeRecords.as_str(), "layout" => layout).increment(records as u64);
    }

    pub fn file_rejected() {
        ::metrics::counter!(MetricName::NormalizeFilesRejected.as_str()).increment(1);
    }
}

pub mod consolidate {
    use super::MetricName;

    pub fn rows_dropped(reason: &'static str, count: usize) {
        ::metrics::counter!(MetricName::ConsolidateRowsDropped.as_str(), "reason" => reason).increment(count as u64);
    }

    pub fn dataset_size(count: usize) {
        ::metrics::gauge!(MetricName::ConsolidateDatasetSize.as_str()).set(count as f64);
    }
}

pub mod transform {
    use super::MetricName;

    pub fn rows_rejected(reason: &'static str, count: usize) {
        ::metrics::counter!(MetricName::TransformRowsRejected.as_str(), "reason" => reason).increment(count as u64);
    }

    pub fn groups(count: usize) {
        ::metrics::gauge!(MetricName::TransformGroups.as_str()).set(count as f64);
    }
}
