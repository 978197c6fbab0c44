use crate::config::NormalizerConfig;
use crate::pipeline::processing::normalize::{parse_amount, LayoutParser};
use crate::pipeline::processing::table::{cell, Table};
use crate::types::{CanonicalRecord, ProviderKey, QuarterReference};

/// Account-coded ledger: one row per (provider, account), keyed by registry id.
/// Only rows for the claims/events account are kept.
pub struct RegulatoryParser {
    target_account_code: String,
    registry_id_column: String,
    account_code_column: String,
    closing_balance_column: String,
}

impl RegulatoryParser {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            target_account_code: config.target_account_code.trim().to_string(),
            registry_id_column: config.registry_id_column.to_uppercase(),
            account_code_column: config.account_code_column.to_uppercase(),
            closing_balance_column: config.closing_balance_column.to_uppercase(),
        }
    }
}

impl LayoutParser for RegulatoryParser {
    fn parse(&self, table: &Table, period: QuarterReference) -> Option<Vec<CanonicalRecord>> {
        let registry_idx = table.column(&self.registry_id_column)?;
        let account_idx = table.column(&self.account_code_column)?;
        let balance_idx = table.column(&self.closing_balance_column)?;

        let records = table
            .rows
            .iter()
            .filter(|row| cell(row, account_idx).trim() == self.target_account_code)
            .map(|row| CanonicalRecord {
                provider_key: ProviderKey::RegistryId(cell(row, registry_idx).trim().replace('"', "")),
                legal_name: String::new(),
                period,
                expense_value: parse_amount(cell(row, balance_idx)),
            })
            .collect();
        Some(records)
    }
}
