use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::constants::TAX_ID_LEN;
use crate::error::{PipelineError, Result};

/// One filing period. Field order makes the derived ordering (year, quarter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuarterReference {
    pub year: i32,
    pub quarter: u8,
}

impl QuarterReference {
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(PipelineError::InvalidQuarter { year, quarter });
        }
        Ok(Self { year, quarter })
    }

    /// Parses a quarter archive name such as `1T2025.zip` (case-insensitive).
    pub fn from_archive_name(name: &str) -> Option<Self> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let re = PATTERN
            .get_or_init(|| Regex::new(r"(?i)^([1-4])T(\d{4})\.zip$").ok())
            .as_ref()?;
        let caps = re.captures(name)?;
        let quarter = caps[1].parse().ok()?;
        let year = caps[2].parse().ok()?;
        Some(Self { year, quarter })
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self)
    }
}

impl fmt::Display for QuarterReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.quarter, self.year)
    }
}

/// A remote quarter archive selected by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHandle {
    pub url: String,
    pub period: QuarterReference,
}

/// A quarter archive that has been written to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArchive {
    pub path: PathBuf,
    pub period: QuarterReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatSignal {
    /// Delimited text (csv/txt)
    Text,
    /// Binary workbook (xlsx/xls)
    Spreadsheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileCandidate {
    pub path: PathBuf,
    pub signal: FormatSignal,
}

/// How a normalized record identifies its provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKey {
    /// 14-digit tax identifier, already normalized
    TaxId(String),
    /// Intermediate registry identifier, resolved against the registry during consolidation
    RegistryId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub provider_key: ProviderKey,
    pub legal_name: String,
    pub period: QuarterReference,
    pub expense_value: Decimal,
}

/// All records normalized out of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub source: PathBuf,
    pub records: Vec<CanonicalRecord>,
}

impl RecordSet {
    pub fn carries_registry_ids(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r.provider_key, ProviderKey::RegistryId(_)))
    }
}

/// A provider row from the registry reference table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub registry_id: String,
    pub tax_id: Option<String>,
    pub legal_name: String,
    pub modality: String,
    pub state: String,
}

/// One row of the consolidated output, in canonical column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub tax_id: String,
    pub legal_name: String,
    pub period: QuarterReference,
    pub expense_value: Decimal,
}

/// Unique on (tax id, year, quarter) and sorted by (year, quarter, tax id).
/// Only the consolidator builds one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsolidatedDataset {
    records: Vec<ConsolidatedRecord>,
}

impl ConsolidatedDataset {
    pub(crate) fn from_ordered(records: Vec<ConsolidatedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ConsolidatedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Strips everything but digits, then truncates or left-pads with zeros to 14
/// characters. Inputs without any digit have no tax id.
pub fn normalize_tax_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).take(TAX_ID_LEN).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{:0>width$}", digits, width = TAX_ID_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_reference_rejects_out_of_range() {
        assert!(QuarterReference::new(2025, 0).is_err());
        assert!(QuarterReference::new(2025, 5).is_err());
        assert_eq!(QuarterReference::new(2025, 4).unwrap().quarter, 4);
    }

    #[test]
    fn test_quarter_ordering_is_year_then_quarter() {
        let a = QuarterReference::new(2024, 4).unwrap();
        let b = QuarterReference::new(2025, 1).unwrap();
        let c = QuarterReference::new(2025, 3).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_archive_name_parsing() {
        assert_eq!(
            QuarterReference::from_archive_name("3T2024.zip"),
            Some(QuarterReference { year: 2024, quarter: 3 })
        );
        assert_eq!(
            QuarterReference::from_archive_name("1t2025.ZIP"),
            Some(QuarterReference { year: 2025, quarter: 1 })
        );
        assert_eq!(QuarterReference::from_archive_name("5T2025.zip"), None);
        assert_eq!(QuarterReference::from_archive_name("1T2025.csv"), None);
        assert_eq!(QuarterReference::from_archive_name("x1T2025.zip"), None);
        assert_eq!(QuarterReference::new(2025, 2).unwrap().archive_name(), "2T2025.zip");
    }

    #[test]
    fn test_normalize_tax_id() {
        assert_eq!(normalize_tax_id("11.222.333/0001-81").as_deref(), Some("11222333000181"));
        assert_eq!(normalize_tax_id("1234").as_deref(), Some("00000000001234"));
        assert_eq!(normalize_tax_id("112223330001819999").as_deref(), Some("11222333000181"));
        assert_eq!(normalize_tax_id(""), None);
        assert_eq!(normalize_tax_id("n/a"), None);
    }
}
