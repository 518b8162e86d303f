//! Keyword intent routing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the user asked for. Serialized as the human-readable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "Analyze Data")]
    Analyze,
    #[serde(rename = "Generate Visualization")]
    Visualize,
    #[serde(rename = "Generate Report")]
    Report,
    #[serde(rename = "Unknown Intent")]
    Unknown,
}

impl Intent {
    /// Case-insensitive substring match, first hit wins:
    /// "analyze", then "visualize" / "show me", then "report".
    pub fn detect(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("analyze") {
            Intent::Analyze
        } else if text.contains("visualize") || text.contains("show me") {
            Intent::Visualize
        } else if text.contains("report") {
            Intent::Report
        } else {
            Intent::Unknown
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Intent::Analyze => "Analyze Data",
            Intent::Visualize => "Generate Visualization",
            Intent::Report => "Generate Report",
            Intent::Unknown => "Unknown Intent",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
