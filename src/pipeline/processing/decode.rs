use encoding_rs::Encoding;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Text successfully decoded by one of the chain's encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
}

/// Ordered list of encodings; the first one that decodes without error wins.
#[derive(Debug, Clone)]
pub struct TextDecoder {
    chain: Vec<&'static Encoding>,
}

impl TextDecoder {
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let chain = labels
            .iter()
            .map(|label| {
                Encoding::for_label(label.as_ref().as_bytes())
                    .ok_or_else(|| PipelineError::Config(format!("Unknown encoding label '{}'", label.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;
        if chain.is_empty() {
            return Err(PipelineError::Config("Encoding chain must not be empty".into()));
        }
        Ok(Self { chain })
    }

    /// Tries each encoding in order; `None` means the chain is exhausted.
    pub fn decode(&self, bytes: &[u8]) -> Option<Decoded> {
        for encoding in &self.chain {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                let text = text.strip_prefix('\u{feff}').unwrap_or(&text).to_string();
                return Some(Decoded { text, encoding: encoding.name() });
            }
            debug!("{} rejected input", encoding.name());
        }
        None
    }

    pub fn read_to_string(&self, path: &Path) -> Result<Decoded> {
        let bytes = fs::read(path)?;
        self.decode(&bytes).ok_or_else(|| self.undecodable(path))
    }

    /// First line of the file (without line terminator), truncated to
    /// `max_chars` characters.
    pub fn read_first_line(&self, path: &Path, max_chars: usize) -> Result<String> {
        // '\n' is a single byte in every supported encoding
        let mut line = Vec::new();
        BufReader::new(File::open(path)?).read_until(b'\n', &mut line)?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        let decoded = self.decode(&line).ok_or_else(|| self.undecodable(path))?;
        Ok(decoded.text.trim_end_matches('\r').chars().take(max_chars).collect())
    }

    fn undecodable(&self, path: &Path) -> PipelineError {
        let tried = self.chain.iter().map(|e| e.name()).collect::<Vec<_>>().join(", ");
        PipelineError::Undecodable { path: path.to_path_buf(), tried }
    }
}

/// First line of already-decoded text, truncated to `max_chars` characters.
pub fn first_line(text: &str, max_chars: usize) -> String {
    text.lines().next().unwrap_or("").chars().take(max_chars).collect()
}
