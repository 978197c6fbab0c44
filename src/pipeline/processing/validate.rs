use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::constants::TAX_ID_LEN;
use crate::observability::metrics;
use crate::types::{normalize_tax_id, ConsolidatedRecord};

const FIRST_DIGIT_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_DIGIT_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    InvalidTaxId,
    NonPositiveValue,
    BlankLegalName,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::InvalidTaxId => "invalid_tax_id",
            Rejection::NonPositiveValue => "non_positive_value",
            Rejection::BlankLegalName => "blank_legal_name",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: Vec<ConsolidatedRecord>,
    pub rejected: Vec<(ConsolidatedRecord, Rejection)>,
}

impl ValidationReport {
    pub fn rejected_for(&self, reason: Rejection) -> usize {
        self.rejected.iter().filter(|(_, r)| *r == reason).count()
    }
}

/// 14 digits whose last two are the modulus-11 check digits of the first 12.
pub fn is_valid_tax_id(tax_id: &str) -> bool {
    let digits: Vec<u32> = tax_id.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != TAX_ID_LEN || tax_id.chars().any(|c| !c.is_ascii_digit()) {
        return false;
    }
    let first = check_digit(&digits[..12], &FIRST_DIGIT_WEIGHTS);
    let second = check_digit(&digits[..13], &SECOND_DIGIT_WEIGHTS);
    digits[12] == first && digits[13] == second
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let digit = 11 - (sum % 11);
    if digit >= 10 {
        0
    } else {
        digit
    }
}

/// Splits rows into valid ones and rejected ones, first failing rule wins.
/// Tax ids are re-normalized before checking.
pub fn validate(records: Vec<ConsolidatedRecord>) -> ValidationReport {
    let mut report = ValidationReport::default();
    for mut record in records {
        if let Some(tax_id) = normalize_tax_id(&record.tax_id) {
            record.tax_id = tax_id;
        }
        let rejection = if !is_valid_tax_id(&record.tax_id) {
            Some(Rejection::InvalidTaxId)
        } else if record.expense_value <= Decimal::ZERO {
            Some(Rejection::NonPositiveValue)
        } else if record.legal_name.trim().is_empty() {
            Some(Rejection::BlankLegalName)
        } else {
            None
        };
        match rejection {
            Some(reason) => report.rejected.push((record, reason)),
            None => report.valid.push(record),
        }
    }

    for reason in [Rejection::InvalidTaxId, Rejection::NonPositiveValue, Rejection::BlankLegalName] {
        let count = report.rejected_for(reason);
        if count > 0 {
            warn!("Rejected {} row(s): {}", count, reason.as_str());
            metrics::transform::rows_rejected(reason.as_str(), count);
        }
    }
    info!("{} row(s) passed validation", report.valid.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuarterReference;

    fn row(tax_id: &str, name: &str, value: i64) -> ConsolidatedRecord {
        ConsolidatedRecord {
            tax_id: tax_id.into(),
            legal_name: name.into(),
            period: QuarterReference::new(2025, 1).unwrap(),
            expense_value: Decimal::from(value),
        }
    }

    #[test]
    fn test_check_digits() {
        assert!(is_valid_tax_id("11222333000181"));
        assert!(is_valid_tax_id("11444777000161"));
        assert!(!is_valid_tax_id("11222333000182"));
        assert!(!is_valid_tax_id("1122233300018"));
        assert!(!is_valid_tax_id("11.222.333/0001-81"));
    }

    #[test]
    fn test_validate_rejects_each_rule() {
        let report = validate(vec![
            row("11222333000181", "Alfa", 10),
            row("11222333000182", "Bad digits", 10),
            row("11444777000161", "Zero", 0),
            row("11444777000161", "   ", 5),
        ]);
        assert_eq!(report.valid.len(), 1);
        assert_eq!(report.rejected_for(Rejection::InvalidTaxId), 1);
        assert_eq!(report.rejected_for(Rejection::NonPositiveValue), 1);
        assert_eq!(report.rejected_for(Rejection::BlankLegalName), 1);
    }

    #[test]
    fn test_validate_normalizes_formatted_tax_ids() {
        let report = validate(vec![row("11.222.333/0001-81", "Alfa", 1)]);
        assert_eq!(report.valid[0].tax_id, "11222333000181");
    }
}
