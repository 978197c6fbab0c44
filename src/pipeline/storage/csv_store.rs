use csv::WriterBuilder;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::constants::{AGGREGATED_COLUMNS, CONSOLIDATED_COLUMNS, OUTPUT_DELIMITER};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::aggregate::ProviderAggregate;
use crate::pipeline::processing::decode::TextDecoder;
use crate::pipeline::processing::normalize::parse_amount;
use crate::pipeline::processing::table::{cell, Table};
use crate::types::{ConsolidatedDataset, ConsolidatedRecord, QuarterReference};

/// Two decimals, '.' as decimal mark.
fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes the consolidated hand-off file: UTF-8, `;`-delimited,
/// `CNPJ;RazaoSocial;Trimestre;Ano;ValorDespesas`.
pub fn write_consolidated_csv(dataset: &ConsolidatedDataset, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new().delimiter(OUTPUT_DELIMITER).from_path(path)?;
    writer.write_record(CONSOLIDATED_COLUMNS)?;
    for record in dataset.records() {
        writer.write_record([
            record.tax_id.clone(),
            record.legal_name.clone(),
            record.period.quarter.to_string(),
            record.period.year.to_string(),
            money(record.expense_value),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} row(s) to {}", dataset.len(), path.display());
    Ok(())
}

/// Zips `csv_path` into `zip_path` as a single deflated entry.
pub fn package_zip(csv_path: &Path, zip_path: &Path) -> Result<()> {
    ensure_parent(zip_path)?;
    let entry_name = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PipelineError::Config(format!("{} has no file name", csv_path.display())))?;

    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options: FileOptions<'_, ()> = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options)?;
    io::copy(&mut File::open(csv_path)?, &mut zip)?;
    zip.finish()?.flush()?;
    info!("Packaged {} into {}", csv_path.display(), zip_path.display());
    Ok(())
}

/// Reads a consolidated file back. Rows with an unusable period are skipped;
/// a file without the canonical columns yields no rows.
pub fn read_consolidated_csv(path: &Path, decoder: &TextDecoder) -> Result<Vec<ConsolidatedRecord>> {
    if !path.exists() {
        return Err(PipelineError::MissingConsolidated(path.to_path_buf()));
    }
    let decoded = decoder.read_to_string(path)?;
    let table = Table::from_delimited(&decoded.text, OUTPUT_DELIMITER)?;

    let columns: Option<Vec<usize>> = CONSOLIDATED_COLUMNS.iter().map(|name| table.column(name)).collect();
    let Some(columns) = columns else {
        warn!("{} lacks the consolidated columns {:?}", path.display(), CONSOLIDATED_COLUMNS);
        return Ok(Vec::new());
    };
    let [tax_idx, name_idx, quarter_idx, year_idx, value_idx] = [columns[0], columns[1], columns[2], columns[3], columns[4]];

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let period = cell(row, year_idx)
            .trim()
            .parse::<i32>()
            .ok()
            .zip(cell(row, quarter_idx).trim().parse::<u8>().ok())
            .and_then(|(year, quarter)| QuarterReference::new(year, quarter).ok());
        let Some(period) = period else {
            debug!("Skipping row with unusable period: {:?}", row);
            continue;
        };
        records.push(ConsolidatedRecord {
            tax_id: cell(row, tax_idx).trim().to_string(),
            legal_name: cell(row, name_idx).trim().to_string(),
            period,
            expense_value: parse_amount(cell(row, value_idx)),
        });
    }
    info!("Loaded {} consolidated row(s) from {}", records.len(), path.display());
    Ok(records)
}

/// `RazaoSocial;UF;ValorTotal;MediaPorTrimestre;DesvioPadraoDespesas`
pub fn write_aggregated_csv(aggregates: &[ProviderAggregate], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new().delimiter(OUTPUT_DELIMITER).from_path(path)?;
    writer.write_record(AGGREGATED_COLUMNS)?;
    for row in aggregates {
        writer.write_record([
            row.legal_name.clone(),
            row.state.clone(),
            money(row.total),
            money(row.mean_per_quarter),
            money(row.std_dev),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} group(s) to {}", aggregates.len(), path.display());
    Ok(())
}
