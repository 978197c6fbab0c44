use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::decode::TextDecoder;
use crate::pipeline::processing::spreadsheet;
use crate::types::{FormatSignal, RawFileCandidate};

/// Which pass produced the candidates of one extracted archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Strict,
    Fallback,
    /// Neither pass matched anything
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub pass: MatchPass,
    pub candidates: Vec<RawFileCandidate>,
}

/// Decides which extracted files plausibly hold the claims/events expense
/// lines, from their names and first content line.
#[derive(Debug, Clone)]
pub struct FormatClassifier {
    target_keywords: Vec<String>,
    identifier_keywords: Vec<String>,
    value_keywords: Vec<String>,
    text_extensions: Vec<String>,
    spreadsheet_extensions: Vec<String>,
    first_line_chars: usize,
    fallback_first_line_chars: usize,
    decoder: TextDecoder,
}

impl FormatClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            target_keywords: lowered(&config.target_keywords),
            identifier_keywords: lowered(&config.fallback_identifier_keywords),
            value_keywords: lowered(&config.fallback_value_keywords),
            text_extensions: lowered(&config.text_extensions),
            spreadsheet_extensions: lowered(&config.spreadsheet_extensions),
            first_line_chars: config.first_line_chars,
            fallback_first_line_chars: config.fallback_first_line_chars,
            decoder: TextDecoder::from_labels(&config.encodings)?,
        })
    }

    pub fn decoder(&self) -> &TextDecoder {
        &self.decoder
    }

    /// True when any target keyword occurs in the lower-cased filename
    /// followed by the first line.
    pub fn matches_target(&self, filename: &str, first_line: &str) -> bool {
        let haystack = format!("{} {}", filename, first_line).to_lowercase();
        self.target_keywords.iter().any(|k| haystack.contains(k.as_str()))
    }

    /// Fallback test on a first line: an identifier keyword plus a value keyword.
    pub fn matches_fallback(&self, first_line: &str) -> bool {
        let line = first_line.to_lowercase();
        self.identifier_keywords.iter().any(|k| line.contains(k.as_str()))
            && self.value_keywords.iter().any(|k| line.contains(k.as_str()))
    }

    pub fn signal_for(&self, path: &Path) -> Option<FormatSignal> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if self.text_extensions.contains(&ext) {
            Some(FormatSignal::Text)
        } else if self.spreadsheet_extensions.contains(&ext) {
            Some(FormatSignal::Spreadsheet)
        } else {
            None
        }
    }

    /// Strict pass, then the fallback pass if the strict one found nothing
    /// anywhere under `dir`.
    pub fn find_candidates(&self, dir: &Path) -> Vec<RawFileCandidate> {
        self.classify(dir).candidates
    }

    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn classify(&self, dir: &Path) -> Classification {
        let files = self.scan(dir);

        let strict: Vec<RawFileCandidate> = files
            .iter()
            .filter(|candidate| self.strict_match(candidate))
            .cloned()
            .collect();
        if !strict.is_empty() {
            info!("{} candidate file(s) matched target keywords", strict.len());
            metrics::classifier::candidates(strict.len());
            return Classification { pass: MatchPass::Strict, candidates: strict };
        }

        let fallback: Vec<RawFileCandidate> = files
            .iter()
            .filter(|candidate| candidate.signal == FormatSignal::Text)
            .filter(|candidate| self.fallback_match(&candidate.path))
            .cloned()
            .collect();
        if !fallback.is_empty() {
            info!("No keyword match; fallback pass accepted {} file(s)", fallback.len());
            metrics::classifier::fallback_used();
            metrics::classifier::candidates(fallback.len());
            return Classification { pass: MatchPass::Fallback, candidates: fallback };
        }

        warn!("No candidate files under {}", dir.display());
        Classification { pass: MatchPass::Unmatched, candidates: Vec::new() }
    }

    /// Every accepted file under `dir` with its format signal, in file-name
    /// order, each path once.
    pub fn scan(&self, dir: &Path) -> Vec<RawFileCandidate> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if let Some(signal) = self.signal_for(&path) {
                if seen.insert(path.clone()) {
                    files.push(RawFileCandidate { path, signal });
                }
            }
        }
        debug!("Scanned {} accepted file(s) under {}", files.len(), dir.display());
        files
    }

    fn strict_match(&self, candidate: &RawFileCandidate) -> bool {
        let filename = candidate
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let first_line = match candidate.signal {
            FormatSignal::Spreadsheet => spreadsheet::first_row_text(&candidate.path)
                .chars()
                .take(self.first_line_chars)
                .collect(),
            FormatSignal::Text => match self.decoder.read_first_line(&candidate.path, self.first_line_chars) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.path.display(), e);
                    metrics::classifier::file_skipped();
                    return false;
                }
            },
        };
        self.matches_target(&filename, &first_line)
    }

    fn fallback_match(&self, path: &Path) -> bool {
        match self.decoder.read_first_line(path, self.fallback_first_line_chars) {
            Ok(line) => self.matches_fallback(&line),
            Err(e) => {
                warn!("Fallback pass skipping {}: {}", path.display(), e);
                metrics::classifier::file_skipped();
                false
            }
        }
    }
}

fn lowered(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}
