use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::processing::registry::Registry;
use crate::types::{ConsolidatedRecord, QuarterReference};

/// A validated consolidated row with the registry fields attached.
/// Fields are empty when the provider is not in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub tax_id: String,
    pub legal_name: String,
    pub period: QuarterReference,
    pub expense_value: Decimal,
    pub registry_id: String,
    pub modality: String,
    pub state: String,
}

impl EnrichedRecord {
    fn bare(record: ConsolidatedRecord) -> Self {
        Self {
            tax_id: record.tax_id,
            legal_name: record.legal_name,
            period: record.period,
            expense_value: record.expense_value,
            registry_id: String::new(),
            modality: String::new(),
            state: String::new(),
        }
    }
}

/// Left join on tax id, first registry entry per tax id.
pub fn enrich(records: Vec<ConsolidatedRecord>, registry: Option<&Registry>) -> Vec<EnrichedRecord> {
    let Some(registry) = registry.filter(|r| r.supports_tax_id_join()) else {
        warn!("No usable registry; registry id, modality and state left blank");
        return records.into_iter().map(EnrichedRecord::bare).collect();
    };

    let index = registry.by_tax_id();
    let mut matched = 0usize;
    let enriched: Vec<EnrichedRecord> = records
        .into_iter()
        .map(|record| {
            let entry = index.get(record.tax_id.as_str()).copied();
            let mut out = EnrichedRecord::bare(record);
            if let Some(entry) = entry {
                matched += 1;
                out.registry_id = entry.registry_id.clone();
                out.modality = entry.modality.clone();
                out.state = entry.state.clone();
            }
            out
        })
        .collect();

    info!("Enriched {}/{} row(s) from the registry", matched, enriched.len());
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegistryEntry;

    fn row(tax_id: &str) -> ConsolidatedRecord {
        ConsolidatedRecord {
            tax_id: tax_id.into(),
            legal_name: "X".into(),
            period: QuarterReference::new(2025, 1).unwrap(),
            expense_value: Decimal::ONE,
        }
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows_blank() {
        let registry = Registry::from_entries(vec![
            RegistryEntry {
                registry_id: "123456".into(),
                tax_id: Some("11222333000181".into()),
                legal_name: "ALFA".into(),
                modality: "Medicina de Grupo".into(),
                state: "PE".into(),
            },
            RegistryEntry {
                registry_id: "999".into(),
                tax_id: Some("11222333000181".into()),
                state: "SP".into(),
                ..Default::default()
            },
        ]);
        let out = enrich(vec![row("11222333000181"), row("11444777000161")], Some(&registry));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].registry_id, "123456");
        assert_eq!(out[0].state, "PE");
        assert_eq!(out[1].registry_id, "");
        assert_eq!(out[1].state, "");
    }

    #[test]
    fn test_absent_registry_blanks_everything() {
        let out = enrich(vec![row("11222333000181")], None);
        assert_eq!(out[0].modality, "");
    }
}
