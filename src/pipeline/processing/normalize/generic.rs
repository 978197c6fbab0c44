use crate::config::NormalizerConfig;
use crate::pipeline::processing::columns::{ColumnRule, NamePredicate};
use crate::pipeline::processing::normalize::{parse_amount, LayoutParser};
use crate::pipeline::processing::table::{cell, Table};
use crate::types::{normalize_tax_id, CanonicalRecord, ProviderKey, QuarterReference};

/// Free-form table with tax id, optional legal name and value columns bound
/// by name.
pub struct GenericParser {
    tax_id: ColumnRule,
    legal_name: ColumnRule,
    value: ColumnRule,
}

impl GenericParser {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            tax_id: ColumnRule::new("tax_id", vec![NamePredicate::any(&config.tax_id_hints)]),
            legal_name: ColumnRule::new("legal_name", vec![NamePredicate::any(&config.legal_name_hints)]),
            value: ColumnRule::new("value", vec![NamePredicate::any(&config.value_hints)]),
        }
    }
}

impl LayoutParser for GenericParser {
    fn parse(&self, table: &Table, period: QuarterReference) -> Option<Vec<CanonicalRecord>> {
        let tax_idx = self.tax_id.bind(&table.headers)?;
        let value_idx = self.value.bind(&table.headers)?;
        let name_idx = self.legal_name.bind(&table.headers);

        let records = table
            .rows
            .iter()
            .filter_map(|row| {
                let tax_id = normalize_tax_id(cell(row, tax_idx))?;
                Some(CanonicalRecord {
                    provider_key: ProviderKey::TaxId(tax_id),
                    legal_name: name_idx.map(|i| cell(row, i).trim().to_string()).unwrap_or_default(),
                    period,
                    expense_value: parse_amount(cell(row, value_idx)),
                })
            })
            .collect();
        Some(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn parse(text: &str, delimiter: u8) -> Option<Vec<CanonicalRecord>> {
        let table = Table::from_delimited(text, delimiter).unwrap();
        GenericParser::new(&NormalizerConfig::default()).parse(&table, QuarterReference::new(2025, 1).unwrap())
    }

    #[test]
    fn test_tax_id_is_normalized_and_blank_rows_dropped() {
        let records = parse(
            "CNPJ;Razao Social;Valor Despesas\n\
             11.222.333/0001-81; Alfa Saude ;1.234,5\n\
             ;Sem CNPJ;10\n\
             1234;Curto;7,25\n",
            b';',
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].provider_key, ProviderKey::TaxId("11222333000181".into()));
        assert_eq!(records[0].legal_name, "Alfa Saude");
        // thousands separator is not understood: coerces to zero
        assert_eq!(records[0].expense_value, Decimal::ZERO);
        assert_eq!(records[1].provider_key, ProviderKey::TaxId("00000000001234".into()));
        assert_eq!(records[1].expense_value, Decimal::new(725, 2));
    }

    #[test]
    fn test_zero_value_row_survives_parsing() {
        // filtered later by the consolidator, not here
        let records = parse("CNPJ,Valor\n11.222.333/0001-81,0\n", b',').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].expense_value, Decimal::ZERO);
    }

    #[test]
    fn test_legal_name_column_is_optional() {
        let records = parse("cnpj;despesa\n11222333000181;5\n", b';').unwrap();
        assert_eq!(records[0].legal_name, "");
    }

    #[test]
    fn test_missing_tax_id_or_value_is_unparseable() {
        assert!(parse("Nome;Valor\nAlfa;1\n", b';').is_none());
        assert!(parse("CNPJ;Nome\n1;Alfa\n", b';').is_none());
    }
}
