use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::*;
use crate::error::{PipelineError, Result};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Runtime configuration. Every section falls back to its defaults, so an
/// empty (or missing) `config.toml` is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub discovery: DiscoveryConfig,
    pub classifier: ClassifierConfig,
    pub normalizer: NormalizerConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub registry_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How many of the most recent quarters to keep
    pub quarters: usize,
    pub min_year: i32,
    pub max_year: i32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            quarters: DEFAULT_QUARTER_COUNT,
            min_year: MIN_VALID_YEAR,
            max_year: MAX_VALID_YEAR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub target_keywords: Vec<String>,
    pub fallback_identifier_keywords: Vec<String>,
    pub fallback_value_keywords: Vec<String>,
    /// Encoding labels tried in order when decoding text inputs
    pub encodings: Vec<String>,
    pub text_extensions: Vec<String>,
    pub spreadsheet_extensions: Vec<String>,
    pub first_line_chars: usize,
    pub fallback_first_line_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            target_keywords: owned(TARGET_KEYWORDS),
            fallback_identifier_keywords: owned(FALLBACK_IDENTIFIER_KEYWORDS),
            fallback_value_keywords: owned(FALLBACK_VALUE_KEYWORDS),
            encodings: owned(ENCODING_CHAIN),
            text_extensions: owned(TEXT_EXTENSIONS),
            spreadsheet_extensions: owned(SPREADSHEET_EXTENSIONS),
            first_line_chars: FIRST_LINE_CHARS,
            fallback_first_line_chars: FALLBACK_FIRST_LINE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub target_account_code: String,
    pub registry_id_column: String,
    pub account_code_column: String,
    pub closing_balance_column: String,
    pub header_peek_chars: usize,
    pub tax_id_hints: Vec<String>,
    pub legal_name_hints: Vec<String>,
    pub value_hints: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            target_account_code: CLAIMS_EXPENSE_ACCOUNT_CODE.to_string(),
            registry_id_column: REGISTRY_ID_COLUMN.to_string(),
            account_code_column: ACCOUNT_CODE_COLUMN.to_string(),
            closing_balance_column: CLOSING_BALANCE_COLUMN.to_string(),
            header_peek_chars: HEADER_PEEK_CHARS,
            tax_id_hints: owned(TAX_ID_HINTS),
            legal_name_hints: owned(LEGAL_NAME_HINTS),
            value_hints: owned(VALUE_HINTS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub consolidated_csv: String,
    pub consolidated_zip: String,
    pub aggregated_csv: String,
    pub registry_file: String,
    pub run_summary: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            consolidated_csv: CONSOLIDATED_CSV.to_string(),
            consolidated_zip: CONSOLIDATED_ZIP.to_string(),
            aggregated_csv: AGGREGATED_CSV.to_string(),
            registry_file: REGISTRY_FILE.to_string(),
            run_summary: RUN_SUMMARY_FILE.to_string(),
        }
    }
}

impl OutputConfig {
    pub fn consolidated_csv_path(&self) -> PathBuf {
        self.dir.join(&self.consolidated_csv)
    }

    pub fn consolidated_zip_path(&self) -> PathBuf {
        self.dir.join(&self.consolidated_zip)
    }

    pub fn aggregated_csv_path(&self) -> PathBuf {
        self.dir.join(&self.aggregated_csv)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(&self.registry_file)
    }

    pub fn run_summary_path(&self) -> PathBuf {
        self.dir.join(&self.run_summary)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_prefix: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Config {
    /// Loads `path` if given, otherwise `config.toml` when present, otherwise
    /// the defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_value(ENV_BASE_URL) {
            self.source.base_url = v;
        }
        if let Some(v) = env_value(ENV_REGISTRY_URL) {
            self.source.registry_url = v;
        }
        if let Some(v) = env_value(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(v);
        }
        if let Some(v) = env_value(ENV_QUARTERS) {
            self.discovery.quarters = v
                .parse()
                .map_err(|_| PipelineError::Config(format!("{ENV_QUARTERS} must be a positive integer, got '{v}'")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery.quarters == 0 {
            return Err(PipelineError::Config("discovery.quarters must be at least 1".into()));
        }
        if self.discovery.min_year > self.discovery.max_year {
            return Err(PipelineError::Config(format!(
                "discovery.min_year ({}) is after discovery.max_year ({})",
                self.discovery.min_year, self.discovery.max_year
            )));
        }
        if self.classifier.target_keywords.is_empty() {
            return Err(PipelineError::Config("classifier.target_keywords must not be empty".into()));
        }
        if self.classifier.encodings.is_empty() {
            return Err(PipelineError::Config("classifier.encodings must not be empty".into()));
        }
        for label in &self.classifier.encodings {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                return Err(PipelineError::Config(format!("Unknown encoding label '{label}'")));
            }
        }
        if self.normalizer.tax_id_hints.is_empty() || self.normalizer.value_hints.is_empty() {
            return Err(PipelineError::Config(
                "normalizer.tax_id_hints and normalizer.value_hints must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.discovery.quarters, 3);
        assert_eq!(config.normalizer.target_account_code, "41");
        assert_eq!(config.classifier.encodings, vec!["utf-8", "iso-8859-1", "windows-1252"]);
        assert_eq!(config.output.consolidated_csv_path(), PathBuf::from("data/consolidado_despesas.csv"));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [discovery]
            quarters = 5

            [classifier]
            target_keywords = ["sinistro"]
            "#,
        )
        .unwrap();
        assert_eq!(config.discovery.quarters, 5);
        assert_eq!(config.discovery.min_year, 2000);
        assert_eq!(config.classifier.target_keywords, vec!["sinistro"]);
        assert_eq!(config.classifier.text_extensions, vec!["csv", "txt"]);
    }

    #[test]
    fn test_validate_rejects_unknown_encoding() {
        let mut config = Config::default();
        config.classifier.encodings = vec!["utf-8".into(), "klingon".into()];
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_year_range() {
        let mut config = Config::default();
        config.discovery.min_year = 2030;
        config.discovery.max_year = 2020;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_quarters() {
        let mut config = Config::default();
        config.discovery.quarters = 0;
        assert!(config.validate().is_err());
    }
}
