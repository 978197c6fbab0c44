use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::pipeline::processing::columns::{ColumnRule, NamePredicate};
use crate::pipeline::processing::decode::{first_line, TextDecoder};
use crate::pipeline::processing::table::{cell, sniff_delimiter, Table};
use crate::types::{normalize_tax_id, RegistryEntry};

/// Provider registry reference table. Loaded once per run and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    has_registry_ids: bool,
    has_tax_ids: bool,
}

struct RegistryColumns {
    registry_id: ColumnRule,
    tax_id: ColumnRule,
    legal_name: ColumnRule,
    modality: ColumnRule,
    state: ColumnRule,
}

impl RegistryColumns {
    fn standard() -> Self {
        Self {
            registry_id: ColumnRule::new(
                "registry_id",
                vec![
                    NamePredicate::equals("registro_ans"),
                    NamePredicate::all(&["registro", "operadora"]),
                    NamePredicate::all(&["registro", "ans"]),
                    NamePredicate::any(&["registro"]),
                ],
            ),
            tax_id: ColumnRule::new("tax_id", vec![NamePredicate::any(&["cnpj"])]),
            legal_name: ColumnRule::new(
                "legal_name",
                vec![NamePredicate::any(&["razao"]), NamePredicate::any(&["denominacao"])],
            ),
            modality: ColumnRule::new("modality", vec![NamePredicate::any(&["modalidade"])]),
            state: ColumnRule::new("state", vec![NamePredicate::equals("UF")]),
        }
    }
}

impl Registry {
    /// Reads the registry file. Anything unreadable yields an empty registry,
    /// which disables enrichment.
    #[instrument(skip(decoder), fields(path = %path.display()))]
    pub fn load(path: &Path, decoder: &TextDecoder) -> Self {
        match Self::try_load(path, decoder) {
            Ok(registry) => {
                info!("Registry loaded with {} entries", registry.len());
                registry
            }
            Err(e) => {
                warn!("Registry {} unusable, enrichment disabled: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path, decoder: &TextDecoder) -> Result<Self> {
        let decoded = decoder.read_to_string(path)?;
        let delimiter = sniff_delimiter(&first_line(&decoded.text, usize::MAX));
        let table = Table::from_delimited(&decoded.text, delimiter)?;
        Ok(Self::from_table(&table))
    }

    pub fn from_table(table: &Table) -> Self {
        let columns = RegistryColumns::standard();
        let registry_idx = columns.registry_id.bind(&table.headers);
        let tax_idx = columns.tax_id.bind(&table.headers);
        let name_idx = columns.legal_name.bind(&table.headers);
        let modality_idx = columns.modality.bind(&table.headers);
        let state_idx = columns.state.bind(&table.headers);

        let entries = table
            .rows
            .iter()
            .map(|row| RegistryEntry {
                registry_id: text(row, registry_idx).replace('"', ""),
                tax_id: tax_idx.and_then(|i| normalize_tax_id(cell(row, i))),
                legal_name: text(row, name_idx),
                modality: text(row, modality_idx),
                state: text(row, state_idx),
            })
            .collect();

        Self {
            entries,
            has_registry_ids: registry_idx.is_some(),
            has_tax_ids: tax_idx.is_some(),
        }
    }

    pub fn from_entries(entries: Vec<RegistryEntry>) -> Self {
        Self { entries, has_registry_ids: true, has_tax_ids: true }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registry ids can be resolved into tax ids.
    pub fn supports_registry_join(&self) -> bool {
        !self.is_empty() && self.has_registry_ids && self.has_tax_ids
    }

    pub fn supports_tax_id_join(&self) -> bool {
        !self.is_empty() && self.has_tax_ids
    }

    /// First entry per registry id, keyed by `registry_key`.
    pub fn by_registry_id(&self) -> HashMap<String, &RegistryEntry> {
        let mut index = HashMap::new();
        for entry in &self.entries {
            index.entry(registry_key(&entry.registry_id)).or_insert(entry);
        }
        index
    }

    /// First entry per tax id; entries without a tax id are not indexed.
    pub fn by_tax_id(&self) -> HashMap<&str, &RegistryEntry> {
        let mut index = HashMap::new();
        for entry in &self.entries {
            if let Some(tax_id) = entry.tax_id.as_deref() {
                index.entry(tax_id).or_insert(entry);
            }
        }
        index
    }
}

/// Join key for registry ids. Numeric ids compare by value, so `005711`
/// and `5711` are the same operator; anything else is compared as trimmed text.
pub fn registry_key(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"').trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.to_string();
    }
    match trimmed.trim_start_matches('0') {
        "" => "0".to_string(),
        digits => digits.to_string(),
    }
}

fn text(row: &[String], idx: Option<usize>) -> String {
    idx.map(|i| cell(row, i).trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CADOP: &str = "REGISTRO_OPERADORA;CNPJ;Razao_Social;Nome_Fantasia;Modalidade;Cidade;UF;Data_Registro_ANS\n\
        123456;11.222.333/0001-81;ALFA SAUDE S.A.;Alfa;Medicina de Grupo;Recife;PE;2001-05-10\n\
        123456;99.999.999/0001-99;DUPLICADA;Dup;Cooperativa;Natal;RN;2003-01-02\n\
        654321;11444777000161;BETA ODONTO LTDA;Beta;Odontologia de Grupo;Curitiba;PR;1999-12-01\n";

    fn decoder() -> TextDecoder {
        TextDecoder::from_labels(&["utf-8", "iso-8859-1"]).unwrap()
    }

    #[test]
    fn test_loads_cadop_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Relatorio_cadop.csv");
        fs::write(&path, CADOP).unwrap();

        let registry = Registry::load(&path, &decoder());
        assert_eq!(registry.len(), 3);
        assert!(registry.supports_registry_join());

        let first = &registry.entries()[0];
        assert_eq!(first.registry_id, "123456");
        assert_eq!(first.tax_id.as_deref(), Some("11222333000181"));
        assert_eq!(first.legal_name, "ALFA SAUDE S.A.");
        assert_eq!(first.modality, "Medicina de Grupo");
        assert_eq!(first.state, "PE");
    }

    #[test]
    fn test_indexes_keep_first_entry() {
        let table = Table::from_delimited(CADOP, b';').unwrap();
        let registry = Registry::from_table(&table);
        assert_eq!(registry.by_registry_id()["123456"].legal_name, "ALFA SAUDE S.A.");
        assert_eq!(registry.by_tax_id()["11444777000161"].registry_id, "654321");
    }

    #[test]
    fn test_registry_key_ignores_leading_zeros() {
        assert_eq!(registry_key("005711"), "5711");
        assert_eq!(registry_key(" 5711 "), "5711");
        assert_eq!(registry_key("\"005711\""), "5711");
        assert_eq!(registry_key("000"), "0");
        assert_eq!(registry_key("A-0057"), "A-0057");

        let table = Table::from_delimited("REGISTRO_OPERADORA;CNPJ\n005711;11222333000181\n", b';').unwrap();
        let registry = Registry::from_table(&table);
        assert_eq!(registry.entries()[0].registry_id, "005711");
        assert_eq!(registry.by_registry_id()["5711"].tax_id.as_deref(), Some("11222333000181"));
    }

    #[test]
    fn test_missing_file_gives_empty_registry() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::load(&dir.path().join("absent.csv"), &decoder());
        assert!(registry.is_empty());
        assert!(!registry.supports_registry_join());
    }

    #[test]
    fn test_without_registry_column_join_is_unsupported() {
        let table = Table::from_delimited("CNPJ;Razao_Social\n11222333000181;Alfa\n", b';').unwrap();
        let registry = Registry::from_table(&table);
        assert!(!registry.supports_registry_join());
        assert!(registry.supports_tax_id_join());
    }
}
