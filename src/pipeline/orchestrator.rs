use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::{download_archives, extract_archive, fetch_registry, ArchiveDiscovery};
use crate::pipeline::processing::aggregate::{aggregate, ProviderAggregate};
use crate::pipeline::processing::enrich::enrich;
use crate::pipeline::processing::validate::validate;
use crate::pipeline::processing::{
    consolidate, ConsolidationStats, FormatClassifier, MatchPass, RecordNormalizer, Registry, TextDecoder,
};
use crate::pipeline::storage::{
    package_zip, read_consolidated_csv, write_aggregated_csv, write_consolidated_csv, RunSummary,
};
use crate::types::{ArchiveHandle, ConsolidatedDataset, DownloadedArchive, FormatSignal, RecordSet};

/// Outcome of a consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub summary: RunSummary,
    pub stats: ConsolidationStats,
    pub dataset: ConsolidatedDataset,
}

/// Discovery -> download -> registry -> per-archive extraction,
/// classification and normalization -> consolidation -> persistence.
/// Stages run one after another; archives are processed in discovery order.
pub struct ConsolidationPipeline {
    config: Config,
    http: Arc<dyn HttpClientPort>,
    classifier: FormatClassifier,
    normalizer: RecordNormalizer,
}

impl ConsolidationPipeline {
    pub fn new(config: Config, http: Arc<dyn HttpClientPort>) -> Result<Self> {
        let classifier = FormatClassifier::new(&config.classifier)?;
        let normalizer = RecordNormalizer::new(&config.normalizer, classifier.decoder().clone());
        Ok(Self { config, http, classifier, normalizer })
    }

    pub async fn discover(&self) -> Result<Vec<ArchiveHandle>> {
        ArchiveDiscovery::new(self.http.clone(), &self.config.discovery)
            .discover(&self.config.source.base_url, self.config.discovery.quarters)
            .await
    }

    #[instrument(skip(self), fields(output = %self.config.output.dir.display()))]
    pub async fn run(&self) -> Result<ConsolidationReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let output = &self.config.output;
        info!("Starting consolidation run {}", run_id);

        let handles = self.discover().await?;
        let archives = download_archives(self.http.as_ref(), &handles, &output.dir).await?;
        if archives.is_empty() {
            return Err(PipelineError::NoArchives);
        }

        let registry = fetch_registry(
            self.http.as_ref(),
            &self.config.source.registry_url,
            &output.registry_path(),
            false,
        )
        .await
        .map(|path| Registry::load(&path, self.classifier.decoder()));

        let mut errors = Vec::new();
        let mut record_sets: Vec<RecordSet> = Vec::new();
        let mut archives_processed = 0;
        for archive in &archives {
            match self.process_archive(archive) {
                Ok(sets) => {
                    archives_processed += 1;
                    record_sets.extend(sets);
                }
                Err(e) => {
                    warn!("Skipping archive {}: {}", archive.path.display(), e);
                    metrics::ingest::archive_failed("extract");
                    errors.push(format!("{}: {}", archive.path.display(), e));
                }
            }
        }

        let records_normalized: usize = record_sets.iter().map(|s| s.records.len()).sum();
        if records_normalized == 0 {
            return Err(PipelineError::NoRecords { archives: archives.len() });
        }
        let files_normalized = record_sets.len();

        let (dataset, stats) = consolidate(record_sets, registry.as_ref());
        let csv_path = output.consolidated_csv_path();
        let zip_path = output.consolidated_zip_path();
        write_consolidated_csv(&dataset, &csv_path)?;
        package_zip(&csv_path, &zip_path)?;

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            quarters: handles.iter().map(|h| h.period.to_string()).collect(),
            archives_downloaded: archives.len(),
            archives_processed,
            files_normalized,
            records_normalized,
            records_consolidated: dataset.len(),
            registry_entries: registry.as_ref().map(Registry::len).unwrap_or(0),
            consolidated_csv: csv_path.display().to_string(),
            consolidated_zip: zip_path.display().to_string(),
            errors,
        };
        summary.write(&output.run_summary_path())?;

        info!("Run {} finished: {} consolidated record(s)", run_id, dataset.len());
        Ok(ConsolidationReport { summary, stats, dataset })
    }

    /// Extracts one downloaded archive and normalizes its candidate files,
    /// in classifier order. Unreadable or unsupported files are skipped.
    #[instrument(skip(self, archive), fields(period = %archive.period))]
    pub fn process_archive(&self, archive: &DownloadedArchive) -> Result<Vec<RecordSet>> {
        let out_dir = self.config.output.dir.join(format!("extract_{}", archive.period));
        extract_archive(&archive.path, &out_dir)?;

        let classification = self.classifier.classify(&out_dir);
        let candidates = match classification.pass {
            MatchPass::Strict | MatchPass::Fallback => classification.candidates,
            MatchPass::Unmatched => {
                // keyword-free regulatory exports: let the layout guards decide
                let sweep: Vec<_> = self
                    .classifier
                    .scan(&out_dir)
                    .into_iter()
                    .filter(|c| c.signal == FormatSignal::Text)
                    .collect();
                info!("Offering all {} text file(s) to the normalizer", sweep.len());
                sweep
            }
        };

        let mut sets = Vec::new();
        for candidate in &candidates {
            match self.normalizer.normalize(candidate, archive.period) {
                Ok(Some(set)) => sets.push(set),
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.path.display(), e);
                    metrics::classifier::file_skipped();
                }
            }
        }
        Ok(sets)
    }
}

/// Outcome of the validate/enrich/aggregate stage.
#[derive(Debug, Clone)]
pub struct TransformReport {
    pub rows_read: usize,
    pub rows_valid: usize,
    pub rows_rejected: usize,
    pub registry_entries: usize,
    pub aggregates: Vec<ProviderAggregate>,
    pub output: PathBuf,
}

/// Reads the consolidated file back, validates it, enriches it with the
/// registry and writes the per-provider aggregates.
pub struct TransformPipeline {
    config: Config,
    http: Arc<dyn HttpClientPort>,
    decoder: TextDecoder,
}

impl TransformPipeline {
    pub fn new(config: Config, http: Arc<dyn HttpClientPort>) -> Result<Self> {
        let decoder = TextDecoder::from_labels(&config.classifier.encodings)?;
        Ok(Self { config, http, decoder })
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<TransformReport> {
        let output = &self.config.output;
        let rows = read_consolidated_csv(&output.consolidated_csv_path(), &self.decoder)?;
        let rows_read = rows.len();

        let report = validate(rows);
        let rows_rejected = report.rejected.len();

        let registry = fetch_registry(
            self.http.as_ref(),
            &self.config.source.registry_url,
            &output.registry_path(),
            true,
        )
        .await
        .map(|path| Registry::load(&path, &self.decoder));

        let enriched = enrich(report.valid, registry.as_ref());
        let rows_valid = enriched.len();
        let aggregates = aggregate(&enriched);

        let out = output.aggregated_csv_path();
        write_aggregated_csv(&aggregates, &out)?;

        Ok(TransformReport {
            rows_read,
            rows_valid,
            rows_rejected,
            registry_entries: registry.as_ref().map(Registry::len).unwrap_or(0),
            aggregates,
            output: out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::types::QuarterReference;
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    struct Offline;

    #[async_trait]
    impl HttpClientPort for Offline {
        async fn get(&self, _url: &str) -> Result<HttpGetResult> {
            Ok(HttpGetResult { status: 404, bytes: Vec::new() })
        }
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.dir = dir.path().to_path_buf();
        config
    }

    fn write_zip(path: &std::path::Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            let options: FileOptions<'_, ()> = FileOptions::default();
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_keyword_free_archive_is_swept() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("1T2025.zip");
        write_zip(
            &zip_path,
            &[(
                "1T2025.csv",
                &b"\"DATA\";\"REG_ANS\";\"CD_CONTA_CONTABIL\";\"DESCRICAO\";\"VL_SALDO_INICIAL\";\"VL_SALDO_FINAL\"\n\
                  \"2025-01-01\";\"123456\";\"41\";\"X\";\"0\";\"1500,50\"\n"[..],
            )],
        );
        let pipeline = ConsolidationPipeline::new(config(&dir), Arc::new(Offline)).unwrap();
        let archive = DownloadedArchive { path: zip_path, period: QuarterReference::new(2025, 1).unwrap() };

        let sets = pipeline.process_archive(&archive).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].records.len(), 1);
        assert!(dir.path().join("extract_1T2025").join("1T2025.csv").is_file());
    }

    #[test]
    fn test_corrupt_archive_is_an_error_for_that_archive() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("2T2025.zip");
        fs::write(&zip_path, b"garbage").unwrap();
        let pipeline = ConsolidationPipeline::new(config(&dir), Arc::new(Offline)).unwrap();
        let archive = DownloadedArchive { path: zip_path, period: QuarterReference::new(2025, 2).unwrap() };
        assert!(pipeline.process_archive(&archive).is_err());
    }

    #[tokio::test]
    async fn test_transform_requires_consolidated_file() {
        let dir = TempDir::new().unwrap();
        let pipeline = TransformPipeline::new(config(&dir), Arc::new(Offline)).unwrap();
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingConsolidated(_)));
    }

    #[tokio::test]
    async fn test_transform_without_registry() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("consolidado_despesas.csv"),
            "CNPJ;RazaoSocial;Trimestre;Ano;ValorDespesas\n\
             11222333000181;ALFA;1;2025;100.00\n\
             11222333000181;ALFA;2;2025;300.00\n\
             11222333000182;BAD;1;2025;50.00\n",
        )
        .unwrap();
        let pipeline = TransformPipeline::new(config(&dir), Arc::new(Offline)).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_rejected, 1);
        assert_eq!(report.aggregates.len(), 1);
        let written = fs::read_to_string(&report.output).unwrap();
        assert!(written.starts_with("RazaoSocial;UF;ValorTotal;MediaPorTrimestre;DesvioPadraoDespesas\n"));
        assert!(written.contains("ALFA;;400.00;200.00;141.42\n"));
    }
}
