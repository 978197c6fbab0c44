/// Defaults and fixed names shared across the pipeline.
/// Anything an operator may want to change is mirrored in `Config`; these are
/// only the values `Config::default()` starts from.

// Remote sources
pub const DEFAULT_BASE_URL: &str = "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis";
pub const DEFAULT_REGISTRY_URL: &str =
    "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/Relatorio_cadop.csv";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ANS-ETL/1.0)";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

// Discovery
pub const DEFAULT_QUARTER_COUNT: usize = 3;
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2100;

// Classifier
pub const TARGET_KEYWORDS: &[&str] = &["despesas", "eventos", "sinistros", "despesa", "sinistro", "evento"];
pub const FALLBACK_IDENTIFIER_KEYWORDS: &[&str] = &["cnpj"];
pub const FALLBACK_VALUE_KEYWORDS: &[&str] = &["valor", "despesa"];
pub const ENCODING_CHAIN: &[&str] = &["utf-8", "iso-8859-1", "windows-1252"];
pub const TEXT_EXTENSIONS: &[&str] = &["csv", "txt"];
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];
pub const FIRST_LINE_CHARS: usize = 2000;
pub const FALLBACK_FIRST_LINE_CHARS: usize = 1500;

// Normalizer: regulatory ledger layout
pub const CLAIMS_EXPENSE_ACCOUNT_CODE: &str = "41";
pub const REGISTRY_ID_COLUMN: &str = "REG_ANS";
pub const ACCOUNT_CODE_COLUMN: &str = "CD_CONTA_CONTABIL";
pub const CLOSING_BALANCE_COLUMN: &str = "VL_SALDO_FINAL";
pub const HEADER_PEEK_CHARS: usize = 500;

// Normalizer: generic layout column hints
pub const TAX_ID_HINTS: &[&str] = &["cnpj"];
pub const LEGAL_NAME_HINTS: &[&str] = &["razao", "social", "denominacao"];
pub const VALUE_HINTS: &[&str] = &["valor", "despesa"];

/// Tax identifiers (CNPJ) are always this many digits once normalized.
pub const TAX_ID_LEN: usize = 14;

// Persistence contract (consumed verbatim downstream)
pub const OUTPUT_DELIMITER: u8 = b';';
pub const CONSOLIDATED_COLUMNS: [&str; 5] = ["CNPJ", "RazaoSocial", "Trimestre", "Ano", "ValorDespesas"];
pub const AGGREGATED_COLUMNS: [&str; 5] =
    ["RazaoSocial", "UF", "ValorTotal", "MediaPorTrimestre", "DesvioPadraoDespesas"];

// Output locations
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const CONSOLIDATED_CSV: &str = "consolidado_despesas.csv";
pub const CONSOLIDATED_ZIP: &str = "consolidado_despesas.zip";
pub const AGGREGATED_CSV: &str = "despesas_agregadas.csv";
pub const REGISTRY_FILE: &str = "Relatorio_cadop.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

// Logging
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "ans_etl.log";

// Environment overrides
pub const ENV_BASE_URL: &str = "ANS_BASE_URL";
pub const ENV_REGISTRY_URL: &str = "ANS_REGISTRY_URL";
pub const ENV_OUTPUT_DIR: &str = "ANS_OUTPUT_DIR";
pub const ENV_QUARTERS: &str = "ANS_QUARTERS";
