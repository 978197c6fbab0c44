use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use crate::config::NormalizerConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::decode::{first_line, TextDecoder};
use crate::pipeline::processing::spreadsheet;
use crate::pipeline::processing::table::{sniff_delimiter, Table};
use crate::types::{CanonicalRecord, FormatSignal, QuarterReference, RawFileCandidate, RecordSet};

pub mod generic;
pub mod regulatory;

pub use generic::GenericParser;
pub use regulatory::RegulatoryParser;

/// The two tabular layouts the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Account-coded ledger keyed by registry id
    Regulatory,
    /// Free-form columns bound by name
    Generic,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Regulatory => "regulatory",
            Layout::Generic => "generic",
        }
    }
}

/// Parses one table into canonical records for a known period.
pub trait LayoutParser {
    /// `None` when the table lacks the columns this layout needs.
    fn parse(&self, table: &Table, period: QuarterReference) -> Option<Vec<CanonicalRecord>>;
}

/// Turns candidate files into record sets, dispatching on the header line.
pub struct RecordNormalizer {
    header_peek_chars: usize,
    markers: [String; 3],
    regulatory: RegulatoryParser,
    generic: GenericParser,
    decoder: TextDecoder,
}

impl RecordNormalizer {
    pub fn new(config: &NormalizerConfig, decoder: TextDecoder) -> Self {
        Self {
            header_peek_chars: config.header_peek_chars,
            markers: [
                config.registry_id_column.to_uppercase(),
                config.account_code_column.to_uppercase(),
                config.closing_balance_column.to_uppercase(),
            ],
            regulatory: RegulatoryParser::new(config),
            generic: GenericParser::new(config),
            decoder,
        }
    }

    /// Regulatory when the header carries all three ledger columns.
    pub fn detect_layout(&self, header: &str) -> Layout {
        let peek: String = header.chars().take(self.header_peek_chars).collect::<String>().to_uppercase();
        if self.markers.iter().all(|m| peek.contains(m.as_str())) {
            Layout::Regulatory
        } else {
            Layout::Generic
        }
    }

    /// Normalizes one file. `Ok(None)` means the file is not a supported
    /// layout (or holds no rows); errors mean it could not be read at all.
    #[instrument(skip(self, file), fields(path = %file.path.display(), period = %period))]
    pub fn normalize(&self, file: &RawFileCandidate, period: QuarterReference) -> Result<Option<RecordSet>> {
        let (layout, table) = match file.signal {
            FormatSignal::Text => {
                let decoded = self.decoder.read_to_string(&file.path)?;
                let header = first_line(&decoded.text, self.header_peek_chars);
                let layout = self.detect_layout(&header);
                let delimiter = match layout {
                    Layout::Regulatory => b';',
                    Layout::Generic => sniff_delimiter(&header),
                };
                debug!("Decoded as {}, {} layout", decoded.encoding, layout.as_str());
                (layout, Table::from_delimited(&decoded.text, delimiter)?)
            }
            FormatSignal::Spreadsheet => {
                let Some(table) = spreadsheet::read_first_sheet(&file.path)? else {
                    return Ok(self.reject(file, "workbook has no sheets"));
                };
                (self.detect_layout(&table.header_line(';')), table)
            }
        };

        if table.is_empty() {
            return Ok(self.reject(file, "no data rows"));
        }

        let parsed = match layout {
            Layout::Regulatory => self.regulatory.parse(&table, period),
            Layout::Generic => self.generic.parse(&table, period),
        };
        let Some(records) = parsed else {
            return Ok(self.reject(file, "required columns missing"));
        };

        info!("{} record(s) from {} layout", records.len(), layout.as_str());
        metrics::normalize::file_parsed(layout.as_str(), records.len());
        Ok(Some(RecordSet { source: file.path.clone(), records }))
    }

    fn reject(&self, file: &RawFileCandidate, reason: &str) -> Option<RecordSet> {
        warn!("Unsupported file {}: {}", file.path.display(), reason);
        metrics::normalize::file_rejected();
        None
    }
}

/// Numeric coercion shared by both layouts: quotes stripped, decimal comma
/// accepted, anything unparseable is zero.
pub fn parse_amount(raw: &str) -> Decimal {
    let cleaned = raw.trim().replace('"', "").replace(',', ".");
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .unwrap_or(Decimal::ZERO)
}
