//! Layered prompt builder.
//!
//! Prompts are assembled from plain-text fragments under `config/prompts/`.
//! Layers are appended in order and missing files are skipped, so a
//! deployment can drop or override any layer.
//!
//! ```text
//! id.md              persona, sent as the system prompt
//! analysis.txt       {{request}} {{summary}} {{sample}}
//! visualization.txt  {{request}} {{columns}}
//! report.txt         {{title}} {{request}} {{analysis}} {{charts}}
//! ```
//!
//! Substitution is a single pass over the joined text, so `{{...}}` inside a
//! substituted value (a CSV cell, say) is left alone.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SEPARATOR: &str = "\n\n";

pub const PERSONA: &str = "id.md";
pub const ANALYSIS: &str = "analysis.txt";
pub const VISUALIZATION: &str = "visualization.txt";
pub const REPORT: &str = "report.txt";

pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self { prompts_dir: prompts_dir.into(), parts: Vec::new(), vars: HashMap::new() }
    }

    /// Append the contents of `filename`; skipped when the file is missing.
    pub fn layer(mut self, filename: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    self.parts.push(trimmed.to_string());
                }
            }
            Err(_) => {
                tracing::debug!("prompt: layer '{}' not found, skipped", path.display());
            }
        }
        self
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Join layers with blank lines and substitute `{{key}}` placeholders.
    /// Unknown placeholders stay as written.
    pub fn build(self) -> String {
        let joined = self.parts.join(SEPARATOR);
        let mut out = String::with_capacity(joined.len());
        let mut rest = joined.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => match self.vars.get(after[..end].trim()) {
                    Some(value) => {
                        out.push_str(value);
                        rest = &after[end + 2..];
                    }
                    None => {
                        out.push_str("{{");
                        rest = after;
                    }
                },
                None => {
                    out.push_str("{{");
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// The persona layer alone, used as the system prompt. `None` when absent.
pub fn persona(prompts_dir: impl AsRef<Path>) -> Option<String> {
    let text = PromptBuilder::new(prompts_dir.as_ref()).layer(PERSONA).build();
    (!text.is_empty()).then_some(text)
}
