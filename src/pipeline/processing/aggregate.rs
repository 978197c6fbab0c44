use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::observability::metrics;
use crate::pipeline::processing::enrich::EnrichedRecord;

/// Expense statistics for one (legal name, state) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAggregate {
    pub legal_name: String,
    pub state: String,
    pub total: Decimal,
    pub mean_per_quarter: Decimal,
    /// Sample standard deviation; zero for single-observation groups
    pub std_dev: Decimal,
}

/// Groups by (legal name, state) and orders by total, largest first.
/// Ties keep first-seen group order.
pub fn aggregate(records: &[EnrichedRecord]) -> Vec<ProviderAggregate> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Vec<Decimal>> = HashMap::new();
    for record in records {
        let key = (record.legal_name.clone(), record.state.clone());
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record.expense_value);
    }

    let mut aggregates: Vec<ProviderAggregate> = order
        .into_iter()
        .filter_map(|key| {
            let values = groups.remove(&key)?;
            let total: Decimal = values.iter().sum();
            let mean = total / Decimal::from(values.len());
            Some(ProviderAggregate {
                legal_name: key.0,
                state: key.1,
                total,
                mean_per_quarter: mean,
                std_dev: sample_std_dev(&values, mean),
            })
        })
        .collect();

    aggregates.sort_by(|a, b| b.total.cmp(&a.total));
    info!("Aggregated {} row(s) into {} group(s)", records.len(), aggregates.len());
    metrics::transform::groups(aggregates.len());
    aggregates
}

fn sample_std_dev(values: &[Decimal], mean: Decimal) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let squares: Decimal = values.iter().map(|v| (*v - mean) * (*v - mean)).sum();
    let variance = (squares / Decimal::from(values.len() - 1)).to_f64().unwrap_or(0.0);
    Decimal::from_f64(variance.sqrt()).unwrap_or(Decimal::ZERO)
}
