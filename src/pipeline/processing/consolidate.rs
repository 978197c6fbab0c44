use std::collections::HashSet;
use tracing::{info, instrument, warn};

use crate::constants::TAX_ID_LEN;
use crate::observability::metrics;
use crate::pipeline::processing::registry::{registry_key, Registry};
use crate::types::{ConsolidatedDataset, ConsolidatedRecord, ProviderKey, RecordSet};

/// Row counts from one consolidation, for logging and the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConsolidationStats {
    pub input_records: usize,
    pub non_positive: usize,
    pub unresolved: usize,
    pub duplicates: usize,
    pub output_records: usize,
}

/// Merges record sets into the final dataset: positive values only,
/// registry ids resolved to tax ids, unique on (tax id, year, quarter)
/// keeping the first occurrence, sorted by (year, quarter, tax id).
///
/// Concatenation follows the order of `record_sets`, so callers must pass
/// them in a reproducible order.
#[instrument(skip_all, fields(sets = record_sets.len()))]
pub fn consolidate(record_sets: Vec<RecordSet>, registry: Option<&Registry>) -> (ConsolidatedDataset, ConsolidationStats) {
    let mut stats = ConsolidationStats::default();

    let working: Vec<_> = record_sets.into_iter().flat_map(|set| set.records).collect();
    stats.input_records = working.len();

    let positive: Vec<_> = working
        .into_iter()
        .filter(|r| r.expense_value > rust_decimal::Decimal::ZERO)
        .collect();
    stats.non_positive = stats.input_records - positive.len();

    let needs_join = positive
        .iter()
        .any(|r| matches!(r.provider_key, ProviderKey::RegistryId(_)));
    let join = registry.filter(|r| needs_join && r.supports_registry_join());
    if needs_join && join.is_none() {
        warn!("Records keyed by registry id but no usable registry; tax ids left empty");
    }
    let index = join.map(Registry::by_registry_id);

    let mut resolved = Vec::with_capacity(positive.len());
    for record in positive {
        let row = match record.provider_key {
            ProviderKey::TaxId(tax_id) => Some(ConsolidatedRecord {
                tax_id,
                legal_name: record.legal_name,
                period: record.period,
                expense_value: record.expense_value,
            }),
            ProviderKey::RegistryId(registry_id) => match &index {
                Some(index) => index
                    .get(&registry_key(&registry_id))
                    .and_then(|entry| entry.tax_id.as_ref().map(|tax_id| (tax_id, entry)))
                    .filter(|(tax_id, _)| tax_id.len() == TAX_ID_LEN)
                    .map(|(tax_id, entry)| ConsolidatedRecord {
                        tax_id: tax_id.clone(),
                        legal_name: entry.legal_name.clone(),
                        period: record.period,
                        expense_value: record.expense_value,
                    }),
                None => Some(ConsolidatedRecord {
                    tax_id: String::new(),
                    legal_name: record.legal_name,
                    period: record.period,
                    expense_value: record.expense_value,
                }),
            },
        };
        match row {
            Some(row) => resolved.push(row),
            None => stats.unresolved += 1,
        }
    }

    let mut seen = HashSet::new();
    let before_dedup = resolved.len();
    let mut records: Vec<ConsolidatedRecord> = resolved
        .into_iter()
        .filter(|r| seen.insert((r.tax_id.clone(), r.period.year, r.period.quarter)))
        .collect();
    stats.duplicates = before_dedup - records.len();

    records.sort_by(|a, b| {
        (a.period.year, a.period.quarter, a.tax_id.as_str()).cmp(&(b.period.year, b.period.quarter, b.tax_id.as_str()))
    });
    stats.output_records = records.len();

    info!(
        "Consolidated {} -> {} records ({} non-positive, {} unresolved, {} duplicates)",
        stats.input_records, stats.output_records, stats.non_positive, stats.unresolved, stats.duplicates
    );
    metrics::consolidate::rows_dropped("non_positive", stats.non_positive);
    metrics::consolidate::rows_dropped("unresolved", stats.unresolved);
    metrics::consolidate::rows_dropped("duplicate", stats.duplicates);
    metrics::consolidate::dataset_size(stats.output_records);

    (ConsolidatedDataset::from_ordered(records), stats)
}
